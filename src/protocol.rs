// Wire protocol primitives shared by the server, the services and the
// plugin callbacks.
//
// Every queue message keeps its numeric encoding on the wire (editors speak
// raw tuples) and is decoded into a closed enum at the queue boundary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parser::ast::AstKind;

/// A single primitive carried inside a request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&Path> for Value {
    fn from(p: &Path) -> Self {
        Value::Str(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Value::Str(p.to_string_lossy().into_owned())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// An ordered sequence of primitives, as carried on every queue.
pub type Payload = Vec<Value>;

pub fn str_arg(payload: &[Value], index: usize) -> Option<&str> {
    payload.get(index).and_then(Value::as_str)
}

pub fn int_arg(payload: &[Value], index: usize) -> Option<i64> {
    payload.get(index).and_then(Value::as_int)
}

pub fn bool_arg(payload: &[Value], index: usize) -> Option<bool> {
    payload.get(index).and_then(Value::as_bool)
}

/// Message consumed by the server dispatcher: `[action, service_id, payload]`.
#[derive(Debug, Clone)]
pub struct ServerRequest {
    pub action: u8,
    pub service_id: u8,
    pub payload: Payload,
}

/// Message consumed by a service worker: `[tag, payload]`.
#[derive(Debug, Clone)]
pub struct ServiceMessage {
    pub tag: u8,
    pub payload: Payload,
}

impl ServiceMessage {
    pub const STARTUP: u8 = 0x0;
    pub const SHUTDOWN: u8 = 0x1;
    pub const REQUEST: u8 = 0x2;

    pub fn startup(payload: Payload) -> Self {
        Self { tag: Self::STARTUP, payload }
    }

    pub fn shutdown(payload: Payload) -> Self {
        Self { tag: Self::SHUTDOWN, payload }
    }

    pub fn request(payload: Payload) -> Self {
        Self { tag: Self::REQUEST, payload }
    }
}

/// A source position reported back to the editor. Paths are absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub filename: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// One occurrence row returned by find-all-references.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub filename: PathBuf,
    pub line: u32,
    pub column: u32,
    pub usr: String,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Warning,
    Error,
}

/// A single parser diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub filename: PathBuf,
    pub line: u32,
    pub column: u32,
    pub severity: DiagnosticSeverity,
    pub message: String,
}

/// One highlightable occurrence inside a translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightSpan {
    pub line: u32,
    pub column: u32,
    pub length: u32,
    pub kind: AstKind,
}

/// Result handed to a plugin's request callback. Results are materialized
/// into owned values because they cross the worker thread boundary.
#[derive(Debug, Clone)]
pub enum ResultData {
    References(Vec<Reference>),
    Definition(Location),
    Include(PathBuf),
    Highlights(Vec<HighlightSpan>),
    Diagnostics(Vec<Diagnostic>),
    DeducedType(String),
    /// Path to the captured output of an external tool run.
    ToolOutput(PathBuf),
    /// Captured build output plus wall-clock duration of the build command.
    BuildOutput { path: PathBuf, elapsed: Duration },
}
