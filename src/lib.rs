// cxxd - C/C++ source code intelligence daemon
//!
//! A long-running local daemon giving editors C/C++ source-code
//! intelligence: a persistent cross-reference index with parallel
//! out-of-process indexing, on-demand semantic queries (highlighting,
//! diagnostics, type deduction, definition and include navigation), source
//! formatting, static checking and project builds. Editors talk to it
//! through an in-process queue and receive asynchronous callbacks.

pub mod api;
pub mod database;
pub mod error;
pub mod flags;
pub mod logging;
pub mod parser;
pub mod protocol;
pub mod server;
pub mod service;
pub mod services;

#[cfg(test)]
pub mod tests;

// Re-export common types
pub use database::{SymbolDatabase, SymbolRecord};
pub use parser::CxxParser;
pub use parser::ast::{AstKind, Cursor, VisitResult};
pub use protocol::{Payload, ResultData, Value};
pub use server::{Server, ServerAction, ServiceId, ServicePlugins};
pub use service::{Service, ServicePlugin};
