// Declaration table: every named entity a translation unit declares, with
// enough scope information to resolve identifier uses back to it.
//
// Built once per parse and kept alongside the syntax tree. USRs are
// synthesized from qualified names (`c:@<group>@<path>`), which is what makes
// occurrences of the same entity cluster across translation units.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Node, Tree};

use super::ast::AstKind;

/// A single declared entity.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    pub name: String,
    pub qualified: String,
    pub usr: String,
    pub kind: AstKind,
    pub line: u32,
    pub column: u32,
    pub name_start_byte: usize,
    pub is_definition: bool,
    pub visible_start: usize,
    pub visible_end: usize,
    pub type_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Namespace,
    Record,
    Function,
}

struct Scope {
    kind: ScopeKind,
    name: Option<String>,
    start: usize,
    end: usize,
}

pub(crate) struct DeclarationTable {
    decls: Vec<Declaration>,
    by_name: HashMap<String, Vec<usize>>,
    by_name_byte: HashMap<usize, usize>,
    macros: HashSet<String>,
}

impl DeclarationTable {
    pub fn build(tree: &Tree, source: &str) -> Self {
        let mut builder = Builder {
            source,
            scopes: Vec::new(),
            table: DeclarationTable {
                decls: Vec::new(),
                by_name: HashMap::new(),
                by_name_byte: HashMap::new(),
                macros: HashSet::new(),
            },
        };
        builder.walk_children(tree.root_node());
        builder.table
    }

    /// The declaration whose name identifier starts at `byte`, if any.
    pub fn decl_at_name_byte(&self, byte: usize) -> Option<&Declaration> {
        self.by_name_byte.get(&byte).map(|&i| &self.decls[i])
    }

    /// Resolve an unqualified identifier use at `at_byte` to the innermost
    /// visible declaration of that name.
    pub fn resolve(&self, name: &str, at_byte: usize) -> Option<&Declaration> {
        let candidates = self.by_name.get(name)?;
        candidates
            .iter()
            .map(|&i| &self.decls[i])
            .filter(|d| d.visible_start <= at_byte && at_byte < d.visible_end)
            .filter(|d| {
                // locals and parameters only resolve after their declaration
                !matches!(
                    d.kind,
                    AstKind::LocalVariable | AstKind::FunctionParameter
                ) || d.name_start_byte <= at_byte
            })
            .max_by_key(|d| (d.visible_start, d.is_definition))
    }

    /// Resolve an explicitly qualified use (`a::b::c`) by exact or suffix
    /// match against declared qualified names.
    pub fn resolve_qualified(&self, written: &str) -> Option<&Declaration> {
        let name = written.rsplit("::").next()?;
        let candidates = self.by_name.get(name)?;
        let suffix = format!("::{}", written);
        candidates
            .iter()
            .map(|&i| &self.decls[i])
            .filter(|d| d.qualified == written || d.qualified.ends_with(&suffix))
            .max_by_key(|d| d.is_definition)
    }

    /// The defining declaration for `usr`, when one exists in this unit.
    pub fn definition_for_usr(&self, usr: &str) -> Option<&Declaration> {
        self.decls
            .iter()
            .find(|d| d.is_definition && d.usr == usr)
    }

    pub fn is_macro(&self, name: &str) -> bool {
        self.macros.contains(name)
    }

    /// The declared type recorded for `usr`, if any declaration carries one.
    pub fn type_text_for_usr(&self, usr: &str) -> Option<&str> {
        self.decls
            .iter()
            .filter(|d| d.usr == usr)
            .find_map(|d| d.type_text.as_deref())
    }
}

/// The name identifier of a declaration-introducing construct, used when a
/// cursor lands on the construct rather than on the name itself.
pub(crate) fn construct_name_node(node: Node) -> Option<Node> {
    match node.kind() {
        "function_definition" | "declaration" | "field_declaration" | "type_definition" => node
            .child_by_field_name("declarator")
            .and_then(declarator_name_node),
        "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
        | "namespace_definition" | "alias_declaration" | "preproc_def"
        | "preproc_function_def" | "enumerator" => node.child_by_field_name("name"),
        _ => None,
    }
}

pub(crate) fn make_usr(group: char, qualified: &str) -> String {
    format!("c:@{}@{}", group, qualified)
}

pub(crate) fn usr_group(kind: AstKind) -> char {
    match kind {
        AstKind::Class
        | AstKind::Struct
        | AstKind::Enum
        | AstKind::Union
        | AstKind::Typedef
        | AstKind::UsingDeclaration => 'T',
        AstKind::EnumValue => 'E',
        AstKind::Function | AstKind::Method => 'F',
        AstKind::MacroDefinition | AstKind::MacroInstantiation => 'M',
        AstKind::Namespace => 'N',
        _ => 'V',
    }
}

struct Builder<'s> {
    source: &'s str,
    scopes: Vec<Scope>,
    table: DeclarationTable,
}

impl<'s> Builder<'s> {
    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: Node) {
        match node.kind() {
            "namespace_definition" => self.handle_namespace(node),
            "class_specifier" => self.handle_record(node, AstKind::Class),
            "struct_specifier" => self.handle_record(node, AstKind::Struct),
            "union_specifier" => self.handle_record(node, AstKind::Union),
            "enum_specifier" => self.handle_enum(node),
            "function_definition" => self.handle_function(node),
            "declaration" => self.handle_declaration(node),
            "field_declaration" => self.handle_field(node),
            "type_definition" => self.handle_typedef(node),
            "alias_declaration" => self.handle_alias(node),
            "using_declaration" => self.handle_using(node),
            "preproc_def" | "preproc_function_def" => self.handle_macro(node),
            _ => self.walk_children(node),
        }
    }

    fn text(&self, node: Node) -> &'s str {
        &self.source[node.start_byte()..node.end_byte()]
    }

    fn in_record_scope(&self) -> bool {
        self.scopes
            .iter()
            .rev()
            .find(|s| s.kind != ScopeKind::Function)
            .is_some_and(|s| s.kind == ScopeKind::Record)
    }

    fn visible_range(&self) -> (usize, usize) {
        match self.scopes.last() {
            Some(scope) => (scope.start, scope.end),
            None => (0, self.source.len()),
        }
    }

    fn qualified_path(&self, kind: AstKind, extra: &[String], name: &str) -> String {
        let include_functions = matches!(
            kind,
            AstKind::LocalVariable | AstKind::FunctionParameter
        );
        let mut parts: Vec<&str> = Vec::new();
        for scope in &self.scopes {
            let relevant = match scope.kind {
                ScopeKind::Namespace | ScopeKind::Record => true,
                ScopeKind::Function => include_functions,
            };
            if relevant {
                if let Some(scope_name) = &scope.name {
                    parts.push(scope_name);
                }
            }
        }
        for part in extra {
            parts.push(part);
        }
        parts.push(name);
        parts.join("::")
    }

    fn record(
        &mut self,
        name_node: Node,
        kind: AstKind,
        is_definition: bool,
        extra_qualifier: &[String],
        type_text: Option<String>,
    ) {
        let name = self.text(name_node).to_string();
        if name.is_empty() {
            return;
        }
        let qualified = self.qualified_path(kind, extra_qualifier, &name);
        let usr = make_usr(usr_group(kind), &qualified);
        let position = name_node.start_position();
        let (visible_start, visible_end) = self.visible_range();
        let index = self.table.decls.len();
        self.table.decls.push(Declaration {
            name: name.clone(),
            qualified,
            usr,
            kind,
            line: position.row as u32 + 1,
            column: position.column as u32 + 1,
            name_start_byte: name_node.start_byte(),
            is_definition,
            visible_start,
            visible_end,
            type_text,
        });
        self.table.by_name.entry(name).or_default().push(index);
        self.table
            .by_name_byte
            .insert(name_node.start_byte(), index);
    }

    fn handle_namespace(&mut self, node: Node) {
        let name_node = node.child_by_field_name("name");
        if let Some(name_node) = name_node {
            self.record(name_node, AstKind::Namespace, true, &[], None);
        }
        if let Some(body) = node.child_by_field_name("body") {
            let name = name_node.map(|n| self.text(n).to_string());
            self.scopes.push(Scope {
                kind: ScopeKind::Namespace,
                name,
                start: body.start_byte(),
                end: body.end_byte(),
            });
            self.walk_children(body);
            self.scopes.pop();
        }
    }

    fn handle_record(&mut self, node: Node, kind: AstKind) {
        let name_node = node.child_by_field_name("name");
        let body = node.child_by_field_name("body");
        if let Some(name_node) = name_node {
            self.record(name_node, kind, body.is_some(), &[], None);
        }
        if let Some(body) = body {
            let name = name_node.map(|n| self.text(n).to_string());
            self.scopes.push(Scope {
                kind: ScopeKind::Record,
                name,
                start: body.start_byte(),
                end: body.end_byte(),
            });
            self.walk_children(body);
            self.scopes.pop();
        }
    }

    fn handle_enum(&mut self, node: Node) {
        let body = node.child_by_field_name("body");
        if let Some(name_node) = node.child_by_field_name("name") {
            self.record(name_node, AstKind::Enum, body.is_some(), &[], None);
        }
        // Enumerators land in the enclosing scope, the way unscoped C/C++
        // enums behave.
        if let Some(body) = body {
            let mut cursor = body.walk();
            let enumerators: Vec<Node> = body
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "enumerator")
                .collect();
            for enumerator in enumerators {
                if let Some(name_node) = enumerator.child_by_field_name("name") {
                    self.record(name_node, AstKind::EnumValue, true, &[], None);
                }
            }
        }
    }

    fn handle_function(&mut self, node: Node) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        let return_type = node.child_by_field_name("type").map(|t| self.text(t).to_string());
        self.handle_function_like(node, declarator, return_type, true);
    }

    /// Shared path for function definitions and prototypes. `owner` is the
    /// node whose extent bounds parameter and local visibility.
    fn handle_function_like(
        &mut self,
        owner: Node,
        declarator: Node,
        return_type: Option<String>,
        has_body: bool,
    ) {
        let Some(fn_declarator) = find_function_declarator(declarator) else {
            return;
        };
        let Some(name_node) = fn_declarator
            .child_by_field_name("declarator")
            .and_then(declarator_name_node)
        else {
            return;
        };

        // An out-of-class definition carries its scope explicitly.
        let mut extra = Vec::new();
        if let Some(inner) = fn_declarator.child_by_field_name("declarator") {
            if inner.kind() == "qualified_identifier" {
                let written = self.text(inner);
                for part in written.split("::") {
                    let part = part.trim();
                    if !part.is_empty() && part != self.text(name_node) {
                        extra.push(part.to_string());
                    }
                }
            }
        }

        let kind = if self.in_record_scope() || !extra.is_empty() {
            AstKind::Method
        } else {
            AstKind::Function
        };
        self.record(name_node, kind, has_body, &extra, return_type);

        let mut function_name = extra.clone();
        function_name.push(self.text(name_node).to_string());
        self.scopes.push(Scope {
            kind: ScopeKind::Function,
            name: Some(function_name.join("::")),
            start: owner.start_byte(),
            end: owner.end_byte(),
        });
        if let Some(parameters) = fn_declarator.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            let params: Vec<Node> = parameters
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "parameter_declaration")
                .collect();
            for parameter in params {
                self.handle_parameter(parameter);
            }
        }
        if let Some(body) = owner.child_by_field_name("body") {
            self.walk_children(body);
        }
        self.scopes.pop();
    }

    fn handle_parameter(&mut self, node: Node) {
        let type_text = node.child_by_field_name("type").map(|t| self.text(t).to_string());
        if let Some(name_node) = node
            .child_by_field_name("declarator")
            .and_then(declarator_name_node)
        {
            self.record(name_node, AstKind::FunctionParameter, true, &[], type_text);
        }
    }

    fn handle_declaration(&mut self, node: Node) {
        // Inline definitions in the type position (`struct S { ... } s;`).
        if let Some(type_node) = node.child_by_field_name("type") {
            if is_type_specifier(type_node) {
                self.walk(type_node);
            }
        }
        let type_text = node.child_by_field_name("type").map(|t| self.text(t).to_string());
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let unwrapped = match declarator.kind() {
                "init_declarator" => declarator
                    .child_by_field_name("declarator")
                    .unwrap_or(declarator),
                _ => declarator,
            };
            if find_function_declarator(unwrapped).is_some() {
                self.handle_function_like(node, unwrapped, type_text.clone(), false);
            } else if let Some(name_node) = declarator_name_node(unwrapped) {
                self.record(name_node, AstKind::LocalVariable, true, &[], type_text.clone());
            }
        }
    }

    fn handle_field(&mut self, node: Node) {
        if let Some(type_node) = node.child_by_field_name("type") {
            if is_type_specifier(type_node) {
                self.walk(type_node);
            }
        }
        let type_text = node.child_by_field_name("type").map(|t| self.text(t).to_string());
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            if find_function_declarator(declarator).is_some() {
                self.handle_function_like(node, declarator, type_text.clone(), false);
            } else if let Some(name_node) = declarator_name_node(declarator) {
                self.record(name_node, AstKind::Field, true, &[], type_text.clone());
            }
        }
    }

    fn handle_typedef(&mut self, node: Node) {
        if let Some(type_node) = node.child_by_field_name("type") {
            if is_type_specifier(type_node) {
                self.walk(type_node);
            }
        }
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            if let Some(name_node) = declarator_name_node(declarator) {
                self.record(name_node, AstKind::Typedef, true, &[], None);
            }
        }
    }

    fn handle_alias(&mut self, node: Node) {
        if let Some(name_node) = node.child_by_field_name("name") {
            self.record(name_node, AstKind::Typedef, true, &[], None);
        }
    }

    fn handle_using(&mut self, node: Node) {
        let mut cursor = node.walk();
        let target = node
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "identifier" | "qualified_identifier"));
        if let Some(target) = target {
            let name_node = match target.kind() {
                "qualified_identifier" => declarator_name_node(target).unwrap_or(target),
                _ => target,
            };
            self.record(name_node, AstKind::UsingDeclaration, false, &[], None);
        }
    }

    fn handle_macro(&mut self, node: Node) {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = self.text(name_node).to_string();
            self.record(name_node, AstKind::MacroDefinition, true, &[], None);
            self.table.macros.insert(name);
        }
    }
}

/// Descend a declarator chain to its name identifier.
pub(crate) fn declarator_name_node(node: Node) -> Option<Node> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "operator_name"
        | "destructor_name" => Some(node),
        "qualified_identifier" => node
            .child_by_field_name("name")
            .and_then(declarator_name_node),
        _ => {
            if let Some(inner) = node.child_by_field_name("declarator") {
                declarator_name_node(inner)
            } else {
                // reference declarators don't field-name their payload
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                children.into_iter().find_map(declarator_name_node)
            }
        }
    }
}

/// Is there a function declarator anywhere down the declarator chain?
fn find_function_declarator(node: Node) -> Option<Node> {
    match node.kind() {
        "function_declarator" => Some(node),
        "pointer_declarator" | "reference_declarator" | "parenthesized_declarator" => node
            .child_by_field_name("declarator")
            .or_else(|| {
                let mut cursor = node.walk();
                let first = node.named_children(&mut cursor).next();
                first
            })
            .and_then(find_function_declarator),
        _ => None,
    }
}

fn is_type_specifier(node: Node) -> bool {
    matches!(
        node.kind(),
        "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
    )
}
