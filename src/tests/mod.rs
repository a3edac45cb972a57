// cxxd's test infrastructure
//
// Shared helpers plus the per-area test modules. Every test works inside its
// own temporary project directory.

pub mod database;
pub mod go_to_definition;
pub mod server;
pub mod tool_services;

pub mod test_helpers {
    use std::path::{Path, PathBuf};

    use anyhow::Result;
    use tempfile::TempDir;

    use crate::flags::CompilerFlags;
    use crate::parser::CxxParser;
    use crate::parser::cache::{CachePolicy, TunitCache};

    /// Create a temporary project directory.
    pub fn create_test_project() -> Result<TempDir> {
        Ok(tempfile::tempdir()?)
    }

    /// Write a file into the project, returning its absolute path.
    pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
        let file_path = dir.join(filename);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, content)?;
        Ok(file_path)
    }

    /// Write a plain compiler-flags file and return its path.
    pub fn create_flags_file(dir: &Path) -> Result<PathBuf> {
        create_test_file(dir, "compile_flags.txt", "-I.\n-std=c++17\n")
    }

    /// A parser facade over a fresh flags file, with a small bounded cache.
    pub fn create_test_parser(dir: &Path) -> Result<CxxParser> {
        let flags = CompilerFlags::from_file(&create_flags_file(dir)?)?;
        Ok(CxxParser::new(
            flags,
            TunitCache::new(CachePolicy::Bounded(4)),
        ))
    }

    /// Sample C++ sources the tests index and query.
    pub mod test_code {
        /// `foobar` is defined on line 3 (name at column 6) and called on
        /// line 9 (column 5).
        pub const MAIN_CPP: &str = r#"#include "utils.hpp"

void foobar() {
    int value = 0;
    value = value + 1;
}

int main() {
    foobar();
    return 0;
}
"#;

        /// Same program with one extra comment line at the top, standing in
        /// for an edited-but-unsaved buffer. `foobar` is defined on line 4
        /// and called on line 10.
        pub const MAIN_CPP_EDITED: &str = r#"// edited, not yet saved
#include "utils.hpp"

void foobar() {
    int value = 0;
    value = value + 1;
}

int main() {
    foobar();
    return 0;
}
"#;

        /// `Helper` class at line 2, name at column 7.
        pub const UTILS_HPP: &str = r#"#pragma once
class Helper {
public:
    int count;
    void reset();
};
"#;

        /// `Widget` class at line 1, name at column 7.
        pub const WIDGET_HPP: &str = r#"class Widget {
public:
    int size;
};
"#;

        /// Broken on purpose: an unclosed parameter list.
        pub const BROKEN_CPP: &str = r#"int main( {
    return 0;
}
"#;
    }
}
