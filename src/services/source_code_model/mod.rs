// Source-code-model service: owns the parser facade, the indexer and the
// leaf handlers, and routes sub-requests to them by numeric id.

pub mod diagnostics;
pub mod go_to_definition;
pub mod go_to_include;
pub mod indexer;
pub mod syntax_highlighter;
pub mod type_deduction;

use std::path::Path;
use std::sync::Arc;

use tracing::error;

use crate::flags::CompilerFlags;
use crate::parser::CxxParser;
use crate::parser::cache::{CachePolicy, TunitCache};
use crate::protocol::{ResultData, Value, int_arg, str_arg};
use crate::service::Service;
use diagnostics::Diagnostics;
use go_to_definition::GoToDefinition;
use go_to_include::GoToInclude;
use indexer::SymbolIndexer;
use syntax_highlighter::SyntaxHighlighter;
use type_deduction::TypeDeduction;

/// How many translation units the long-lived model keeps parsed.
const TUNIT_CACHE_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubServiceId {
    Indexer = 0x0,
    SyntaxHighlight = 0x1,
    Diagnostics = 0x2,
    TypeDeduction = 0x3,
    GoToDefinition = 0x4,
    GoToInclude = 0x5,
}

impl SubServiceId {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for SubServiceId {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, i64> {
        match value {
            0x0 => Ok(SubServiceId::Indexer),
            0x1 => Ok(SubServiceId::SyntaxHighlight),
            0x2 => Ok(SubServiceId::Diagnostics),
            0x3 => Ok(SubServiceId::TypeDeduction),
            0x4 => Ok(SubServiceId::GoToDefinition),
            0x5 => Ok(SubServiceId::GoToInclude),
            other => Err(other),
        }
    }
}

struct ModelState {
    indexer: SymbolIndexer,
    syntax_highlighter: SyntaxHighlighter,
    diagnostics: Diagnostics,
    type_deduction: TypeDeduction,
    go_to_definition: GoToDefinition,
    go_to_include: GoToInclude,
}

/// Facade over the per-feature handlers. Built on startup from
/// `(project_root, compiler_flags_path)`; degraded until then.
pub struct SourceCodeModel {
    state: Option<ModelState>,
}

impl Default for SourceCodeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceCodeModel {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Service for SourceCodeModel {
    fn startup(&mut self, payload: &[Value]) {
        let (Some(project_root), Some(flags_path)) = (str_arg(payload, 0), str_arg(payload, 1))
        else {
            error!("source-code-model startup payload must be (project_root, compiler_flags)");
            return;
        };
        let flags = match CompilerFlags::from_file(Path::new(flags_path)) {
            Ok(flags) => flags,
            Err(e) => {
                error!("Cannot load compiler flags '{}': {}", flags_path, e);
                return;
            }
        };
        let parser = Arc::new(CxxParser::new(
            flags,
            TunitCache::new(CachePolicy::Bounded(TUNIT_CACHE_CAPACITY)),
        ));
        let project_root = Path::new(project_root);
        let indexer = SymbolIndexer::new(Arc::clone(&parser), project_root);
        self.state = Some(ModelState {
            syntax_highlighter: SyntaxHighlighter::new(Arc::clone(&parser)),
            diagnostics: Diagnostics::new(Arc::clone(&parser)),
            type_deduction: TypeDeduction::new(Arc::clone(&parser)),
            go_to_definition: GoToDefinition::new(
                Arc::clone(&parser),
                indexer.symbol_db(),
                project_root,
            ),
            go_to_include: GoToInclude::new(Arc::clone(&parser)),
            indexer,
        });
    }

    fn shutdown(&mut self, _payload: &[Value]) {
        self.state = None;
    }

    fn handle(&mut self, payload: &[Value]) -> (bool, Option<ResultData>) {
        let Some(state) = &mut self.state else {
            error!("source-code-model was never started up; rejecting request");
            return (false, None);
        };
        let Some(sub_id) = int_arg(payload, 0) else {
            error!("source-code-model request payload carries no sub-service id");
            return (false, None);
        };
        let args = &payload[1..];
        match SubServiceId::try_from(sub_id) {
            Ok(SubServiceId::Indexer) => state.indexer.handle(args),
            Ok(SubServiceId::SyntaxHighlight) => state.syntax_highlighter.handle(args),
            Ok(SubServiceId::Diagnostics) => state.diagnostics.handle(args),
            Ok(SubServiceId::TypeDeduction) => state.type_deduction.handle(args),
            Ok(SubServiceId::GoToDefinition) => state.go_to_definition.handle(args),
            Ok(SubServiceId::GoToInclude) => state.go_to_include.handle(args),
            Err(unknown) => {
                error!("Unknown sub-service id={} triggered!", unknown);
                (false, None)
            }
        }
    }
}
