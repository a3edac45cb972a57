// Parser facade
//
// Narrow contract over the C/C++ parser: parse, cursor lookup, definition
// lookup, USR derivation, include listing, diagnostics and AST traversal,
// plus the translation-unit cache. Backed by tree-sitter; the symbol
// identities it hands out are synthesized from qualified names, so two
// translation units that address an entity by the same qualified name agree
// on its USR. Entities only ever addressed through member access (`x.f()`)
// cluster by plain name, which is as far as a syntactic backend can see.

pub mod ast;
pub mod cache;
pub mod decl;
pub mod tunit;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use tree_sitter::{Node, Point};

use crate::flags::CompilerFlags;
use crate::protocol::{Diagnostic, DiagnosticSeverity, Location};
use ast::{AstKind, Cursor, VisitResult};
use cache::TunitCache;
use decl::{construct_name_node, make_usr, usr_group, Declaration};
use tunit::TranslationUnit;

pub struct CxxParser {
    flags: CompilerFlags,
    cache: TunitCache,
}

impl CxxParser {
    pub fn new(flags: CompilerFlags, cache: TunitCache) -> Self {
        Self { flags, cache }
    }

    pub fn flags(&self) -> &CompilerFlags {
        &self.flags
    }

    pub fn cache(&self) -> &TunitCache {
        &self.cache
    }

    /// Parse `contents` standing in for `original`. The two differ only for
    /// edited-but-unsaved buffers. `None` when the file is unreadable or the
    /// parser gives up.
    pub fn parse(&self, contents: &Path, original: &Path) -> Option<Arc<TranslationUnit>> {
        if let Some(hit) = self.cache.fetch(original, contents) {
            return Some(hit);
        }
        let source = match std::fs::read_to_string(contents) {
            Ok(source) => source,
            Err(e) => {
                warn!("Cannot read '{}': {}", contents.display(), e);
                return None;
            }
        };
        let language = language_for(original);
        let mut ts_parser = tree_sitter::Parser::new();
        if let Err(e) = ts_parser.set_language(&language) {
            warn!("Parser language setup failed: {}", e);
            return None;
        }
        let tree = ts_parser.parse(&source, None)?;
        let tunit = Arc::new(TranslationUnit::new(source, tree, contents, original));
        self.cache.store(Arc::clone(&tunit));
        Some(tunit)
    }

    /// The cursor at a 1-based (line, column), or `None` when nothing
    /// nameable lives there.
    pub fn cursor_at(&self, tunit: &TranslationUnit, line: u32, column: u32) -> Option<Cursor> {
        if line == 0 || column == 0 {
            return None;
        }
        let point = Point {
            row: (line - 1) as usize,
            column: (column - 1) as usize,
        };
        let root = tunit.tree().root_node();
        let mut node = root.named_descendant_for_point_range(point, point)?;
        loop {
            if let Some(cursor) = self.cursor_for_node(tunit, node) {
                return Some(cursor);
            }
            match node.parent() {
                Some(parent) if parent.kind() != "translation_unit" => node = parent,
                _ => return None,
            }
        }
    }

    /// Location of the defining declaration for the cursor's entity, when it
    /// is visible inside the same translation unit.
    pub fn definition_of(&self, tunit: &TranslationUnit, cursor: &Cursor) -> Option<Location> {
        let decl = tunit.decls().definition_for_usr(cursor.lookup_usr())?;
        Some(Location {
            filename: tunit.spelling().to_path_buf(),
            line: decl.line,
            column: decl.column,
        })
    }

    /// Declared type of the cursor's entity, as written in the source.
    pub fn deduced_type(&self, tunit: &TranslationUnit, cursor: &Cursor) -> Option<String> {
        tunit
            .decls()
            .type_text_for_usr(cursor.lookup_usr())
            .map(str::to_string)
    }

    /// `#include` directives of the translation unit as
    /// `(resolved path, line, column)`. Directives whose header cannot be
    /// found on disk are skipped.
    pub fn top_level_includes(&self, tunit: &TranslationUnit) -> Vec<(PathBuf, u32, u32)> {
        let mut includes = Vec::new();
        collect_includes(tunit.tree().root_node(), &mut includes);
        let mut resolved = Vec::new();
        for node in includes {
            let Some(path_node) = node.child_by_field_name("path") else {
                continue;
            };
            let written = tunit.source()[path_node.start_byte()..path_node.end_byte()]
                .trim_matches(['"', '<', '>'])
                .to_string();
            let position = node.start_position();
            match self.resolve_include(&written, tunit.original()) {
                Some(path) => resolved.push((
                    path,
                    position.row as u32 + 1,
                    position.column as u32 + 1,
                )),
                None => debug!("Unresolvable include '{}'", written),
            }
        }
        resolved
    }

    fn resolve_include(&self, written: &str, original: &Path) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(parent) = original.parent() {
            candidates.push(parent.join(written));
        }
        for dir in self.flags.include_dirs() {
            candidates.push(dir.join(written));
        }
        candidates.into_iter().find(|c| c.is_file())
    }

    /// Syntax diagnostics: one entry per ERROR or missing node.
    pub fn diagnostics_of(&self, tunit: &TranslationUnit) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        collect_diagnostics(tunit.tree().root_node(), tunit, &mut diagnostics);
        diagnostics
    }

    /// Depth-first traversal delivering every symbol occurrence (declaration
    /// name sites and identifier use sites) as an owned cursor. `Continue`
    /// skips the subtree below the occurrence, `Break` stops the walk.
    pub fn traverse<F>(&self, tunit: &TranslationUnit, mut visitor: F)
    where
        F: FnMut(&Cursor) -> VisitResult,
    {
        let mut stack = vec![tunit.tree().root_node()];
        while let Some(node) = stack.pop() {
            let verdict = match self.occurrence_for_node(tunit, node) {
                Some(cursor) => visitor(&cursor),
                None => VisitResult::Recurse,
            };
            match verdict {
                VisitResult::Break => break,
                VisitResult::Continue => continue,
                VisitResult::Recurse => {
                    let mut walker = node.walk();
                    let children: Vec<Node> = node.named_children(&mut walker).collect();
                    for child in children.into_iter().rev() {
                        stack.push(child);
                    }
                }
            }
        }
    }

    /// Like [`Self::occurrence_for_node`], but also surfaces the name
    /// declaration when the node is a whole declaring construct, so that a
    /// cursor request anywhere on `class Foo { ... }` lands on `Foo`.
    fn cursor_for_node(&self, tunit: &TranslationUnit, node: Node) -> Option<Cursor> {
        if let Some(cursor) = self.occurrence_for_node(tunit, node) {
            return Some(cursor);
        }
        let name_node = construct_name_node(node)?;
        let decl = tunit.decls().decl_at_name_byte(name_node.start_byte())?;
        Some(self.decl_cursor(tunit, decl))
    }

    fn occurrence_for_node(&self, tunit: &TranslationUnit, node: Node) -> Option<Cursor> {
        if !matches!(
            node.kind(),
            "identifier" | "type_identifier" | "field_identifier" | "namespace_identifier"
        ) {
            return None;
        }
        if let Some(decl) = tunit.decls().decl_at_name_byte(node.start_byte()) {
            return Some(self.decl_cursor(tunit, decl));
        }
        Some(self.use_cursor(tunit, node))
    }

    fn decl_cursor(&self, tunit: &TranslationUnit, decl: &Declaration) -> Cursor {
        Cursor {
            name: decl.name.clone(),
            kind: decl.kind,
            usr: decl.usr.clone(),
            referenced_usr: None,
            location: Location {
                filename: tunit.spelling().to_path_buf(),
                line: decl.line,
                column: decl.column,
            },
            is_definition: decl.is_definition,
        }
    }

    fn use_cursor(&self, tunit: &TranslationUnit, node: Node) -> Cursor {
        let decls = tunit.decls();
        let source = tunit.source();
        let name = source[node.start_byte()..node.end_byte()].to_string();
        let position = node.start_position();
        let location = Location {
            filename: tunit.spelling().to_path_buf(),
            line: position.row as u32 + 1,
            column: position.column as u32 + 1,
        };

        // Explicitly qualified name positions carry their scope into the USR.
        let written = if node.kind() != "namespace_identifier" && in_qualified_name_position(node)
        {
            let outer = outermost_qualified(node);
            source[outer.start_byte()..outer.end_byte()]
                .split_whitespace()
                .collect::<String>()
        } else {
            name.clone()
        };

        let resolved = if written.contains("::") {
            decls.resolve_qualified(&written)
        } else {
            decls.resolve(&name, node.start_byte())
        };

        if let Some(decl) = resolved {
            let kind = match decl.kind {
                AstKind::MacroDefinition => AstKind::MacroInstantiation,
                other => other,
            };
            return Cursor {
                name,
                kind,
                usr: make_usr(usr_group(kind), &written),
                referenced_usr: Some(decl.usr.clone()),
                location,
                is_definition: false,
            };
        }

        let kind = self.guess_kind(decls, node, &name);
        Cursor {
            name,
            usr: make_usr(usr_group(kind), &written),
            kind,
            referenced_usr: None,
            location,
            is_definition: false,
        }
    }

    /// Kind of an unresolved use, guessed from its syntactic position.
    fn guess_kind(&self, decls: &decl::DeclarationTable, node: Node, name: &str) -> AstKind {
        let parent_kind = node.parent().map(|p| p.kind()).unwrap_or("");
        if decls.is_macro(name)
            || matches!(parent_kind, "preproc_ifdef" | "preproc_defined")
        {
            return AstKind::MacroInstantiation;
        }
        match node.kind() {
            "type_identifier" => AstKind::Class,
            "namespace_identifier" => AstKind::Namespace,
            "field_identifier" => {
                if in_call_position(node) {
                    AstKind::Method
                } else {
                    AstKind::Field
                }
            }
            _ => {
                if in_call_position(node) {
                    AstKind::Function
                } else {
                    AstKind::LocalVariable
                }
            }
        }
    }
}

fn language_for(path: &Path) -> tree_sitter::Language {
    match path.extension().and_then(|e| e.to_str()) {
        Some("c") => tree_sitter_c::LANGUAGE.into(),
        _ => tree_sitter_cpp::LANGUAGE.into(),
    }
}

/// Is this identifier the callee (directly or through member access /
/// qualification) of a call expression?
fn in_call_position(node: Node) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "call_expression" => {
                return parent
                    .child_by_field_name("function")
                    .is_some_and(|f| f.id() == current.id());
            }
            "field_expression" | "qualified_identifier" => current = parent,
            _ => return false,
        }
    }
    false
}

fn in_qualified_name_position(node: Node) -> bool {
    node.parent()
        .is_some_and(|p| p.kind() == "qualified_identifier")
}

fn outermost_qualified(node: Node) -> Node {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.kind() == "qualified_identifier" {
            current = parent;
        } else {
            break;
        }
    }
    current
}

fn collect_includes<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "preproc_include" {
        out.push(node);
        return;
    }
    let mut walker = node.walk();
    let children: Vec<Node> = node.named_children(&mut walker).collect();
    for child in children {
        collect_includes(child, out);
    }
}

fn collect_diagnostics(node: Node, tunit: &TranslationUnit, out: &mut Vec<Diagnostic>) {
    if node.is_error() || node.is_missing() {
        let position = node.start_position();
        let message = if node.is_missing() {
            format!("missing '{}'", node.kind())
        } else {
            "syntax error".to_string()
        };
        out.push(Diagnostic {
            filename: tunit.spelling().to_path_buf(),
            line: position.row as u32 + 1,
            column: position.column as u32 + 1,
            severity: DiagnosticSeverity::Error,
            message,
        });
        if node.is_missing() {
            return;
        }
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_diagnostics(child, tunit, out);
        }
    }
}
