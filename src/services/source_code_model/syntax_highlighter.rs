// Semantic syntax highlight: every symbol occurrence of a translation unit
// with its kind, for the editor to colorize.

use std::path::Path;
use std::sync::Arc;

use crate::parser::CxxParser;
use crate::parser::ast::VisitResult;
use crate::protocol::{HighlightSpan, ResultData, Value, str_arg};

pub struct SyntaxHighlighter {
    parser: Arc<CxxParser>,
}

impl SyntaxHighlighter {
    pub fn new(parser: Arc<CxxParser>) -> Self {
        Self { parser }
    }

    pub fn handle(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let (Some(original), Some(contents)) = (str_arg(args, 0), str_arg(args, 1)) else {
            return (false, None);
        };
        let Some(tunit) = self.parser.parse(Path::new(contents), Path::new(original)) else {
            return (false, None);
        };
        let mut spans = Vec::new();
        self.parser.traverse(&tunit, |cursor| {
            spans.push(HighlightSpan {
                line: cursor.location.line,
                column: cursor.location.column,
                length: cursor.name.len() as u32,
                kind: cursor.kind,
            });
            VisitResult::Recurse
        });
        (true, Some(ResultData::Highlights(spans)))
    }
}
