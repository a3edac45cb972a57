// AST-level vocabulary shared by the parser facade and its consumers.

use crate::protocol::Location;

/// Classification of a cursor. The numeric tags are persisted in the symbol
/// database; never renumber existing variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstKind {
    Other = 0,
    Class = 1,
    Struct = 2,
    Enum = 3,
    EnumValue = 4,
    Union = 5,
    Typedef = 6,
    UsingDeclaration = 7,
    Function = 8,
    Method = 9,
    LocalVariable = 10,
    FunctionParameter = 11,
    Field = 12,
    MacroDefinition = 13,
    MacroInstantiation = 14,
    Namespace = 15,
}

impl AstKind {
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Self {
        match tag {
            1 => AstKind::Class,
            2 => AstKind::Struct,
            3 => AstKind::Enum,
            4 => AstKind::EnumValue,
            5 => AstKind::Union,
            6 => AstKind::Typedef,
            7 => AstKind::UsingDeclaration,
            8 => AstKind::Function,
            9 => AstKind::Method,
            10 => AstKind::LocalVariable,
            11 => AstKind::FunctionParameter,
            12 => AstKind::Field,
            13 => AstKind::MacroDefinition,
            14 => AstKind::MacroInstantiation,
            15 => AstKind::Namespace,
            _ => AstKind::Other,
        }
    }
}

/// Verdict returned by a traversal visitor for each delivered cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Descend into the subtree.
    Recurse,
    /// Skip the subtree, move on to the next sibling.
    Continue,
    /// Stop the traversal altogether.
    Break,
}

/// An owned position-and-entity handle inside a translation unit.
///
/// Unlike a raw syntax node a cursor carries no lifetime; it is materialized
/// eagerly so it can cross the worker boundary inside results.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub name: String,
    /// Kind of the entity this cursor denotes. For a use site this is the
    /// kind of the referenced entity (resolved or guessed from syntax).
    pub kind: AstKind,
    /// USR synthesized from the written form at this site.
    pub usr: String,
    /// USR of the declaration this site resolves to, when resolution inside
    /// the translation unit succeeded.
    pub referenced_usr: Option<String>,
    pub location: Location,
    pub is_definition: bool,
}

impl Cursor {
    /// The identity used for store lookups: the referenced entity's USR when
    /// present, the cursor's own otherwise. The resulting declaration-site /
    /// use-site asymmetry is part of the contract.
    pub fn lookup_usr(&self) -> &str {
        self.referenced_usr.as_deref().unwrap_or(&self.usr)
    }
}
