// Compiler-flags input: either a JSON compilation database or a plain text
// file of whitespace-separated flags. Consumed by the code model (include
// resolution, handed down to indexing children) and by clang-tidy.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Deserialize;
use tracing::{debug, info};

/// One entry of a JSON compilation database (`compile_commands.json`).
#[derive(Debug, Deserialize)]
struct CompilationDbEntry {
    directory: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[allow(dead_code)]
    file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsSource {
    JsonCompilationDatabase,
    PlainFlags,
}

/// Compiler flags for the project, loaded once per service startup.
#[derive(Debug, Clone)]
pub struct CompilerFlags {
    path: PathBuf,
    source: FlagsSource,
    flags: Vec<String>,
    include_dirs: Vec<PathBuf>,
}

impl CompilerFlags {
    /// Load flags from `path`. `.json` selects the compilation-database
    /// shape, `.txt` the plain whitespace-separated shape; anything else is
    /// rejected.
    pub fn from_file(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_db(path),
            Some("txt") => Self::from_plain(path),
            other => {
                bail!(
                    "unsupported compiler-flags file '{}' (extension {:?}); expected .json or .txt",
                    path.display(),
                    other
                );
            }
        }
    }

    fn from_json_db(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let entries: Vec<CompilationDbEntry> = serde_json::from_str(&contents)?;
        let mut flags = Vec::new();
        for entry in &entries {
            let entry_flags = match (&entry.arguments, &entry.command) {
                (Some(arguments), _) => arguments.clone(),
                (None, Some(command)) => {
                    command.split_whitespace().map(str::to_string).collect()
                }
                (None, None) => Vec::new(),
            };
            collect_flags(&entry_flags, &mut flags);
        }
        info!(
            "Loaded JSON compilation database '{}' ({} entries)",
            path.display(),
            entries.len()
        );
        Ok(Self::collect(path, FlagsSource::JsonCompilationDatabase, flags))
    }

    fn from_plain(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let raw: Vec<String> = contents.split_whitespace().map(str::to_string).collect();
        let mut flags = Vec::new();
        collect_flags(&raw, &mut flags);
        info!(
            "Loaded plain compiler flags '{}' ({} flags)",
            path.display(),
            flags.len()
        );
        Ok(Self::collect(path, FlagsSource::PlainFlags, flags))
    }

    fn collect(path: &Path, source: FlagsSource, flags: Vec<String>) -> Self {
        let include_dirs = include_dirs_of(&flags, path);
        debug!("Include directories: {:?}", include_dirs);
        Self {
            path: path.to_path_buf(),
            source,
            flags,
            include_dirs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> FlagsSource {
        self.source
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Directories named by `-I` flags, for header resolution.
    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Arguments clang-tidy expects: `-p <db>` for a JSON database, the raw
    /// flags after `--` otherwise.
    pub fn tidy_args(&self) -> Vec<String> {
        match self.source {
            FlagsSource::JsonCompilationDatabase => {
                vec!["-p".to_string(), self.path.to_string_lossy().into_owned()]
            }
            FlagsSource::PlainFlags => {
                let mut args = vec!["--".to_string()];
                args.extend(self.flags.iter().cloned());
                args
            }
        }
    }
}

fn collect_flags(raw: &[String], out: &mut Vec<String>) {
    for flag in raw {
        if !out.contains(flag) {
            out.push(flag.clone());
        }
    }
}

fn include_dirs_of(flags: &[String], flags_file: &Path) -> Vec<PathBuf> {
    let base = flags_file.parent().unwrap_or(Path::new("."));
    let mut dirs = Vec::new();
    let mut iter = flags.iter().peekable();
    while let Some(flag) = iter.next() {
        let dir = if let Some(stripped) = flag.strip_prefix("-I") {
            if stripped.is_empty() {
                iter.next().map(String::as_str)
            } else {
                Some(stripped)
            }
        } else {
            None
        };
        if let Some(dir) = dir {
            let path = Path::new(dir);
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            };
            if !dirs.contains(&resolved) {
                dirs.push(resolved);
            }
        }
    }
    dirs
}
