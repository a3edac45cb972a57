// A parsed translation unit: source text, syntax tree and the declaration
// table derived from them.

use std::path::{Path, PathBuf};

use tree_sitter::Tree;

use super::decl::DeclarationTable;

pub struct TranslationUnit {
    source: String,
    tree: Tree,
    spelling: PathBuf,
    original: PathBuf,
    decls: DeclarationTable,
}

impl TranslationUnit {
    pub(crate) fn new(source: String, tree: Tree, spelling: &Path, original: &Path) -> Self {
        let decls = DeclarationTable::build(&tree, &source);
        Self {
            source,
            tree,
            spelling: spelling.to_path_buf(),
            original: original.to_path_buf(),
            decls,
        }
    }

    /// The file that was actually parsed. For an edited buffer this is the
    /// temporary contents file, not the logical name.
    pub fn spelling(&self) -> &Path {
        &self.spelling
    }

    /// The logical file name this unit stands for.
    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    pub(crate) fn decls(&self) -> &DeclarationTable {
        &self.decls
    }

    /// Verbatim text of a 1-based source line, used as display context.
    pub fn line_text(&self, line: u32) -> &str {
        self.source
            .lines()
            .nth(line.saturating_sub(1) as usize)
            .unwrap_or("")
    }
}
