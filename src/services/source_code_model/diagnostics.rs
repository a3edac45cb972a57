// Parser diagnostics for a translation unit.

use std::path::Path;
use std::sync::Arc;

use crate::parser::CxxParser;
use crate::protocol::{ResultData, Value, str_arg};

pub struct Diagnostics {
    parser: Arc<CxxParser>,
}

impl Diagnostics {
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
        let diagnostics = self.parser.diagnostics_of(&tunit);
        (true, Some(ResultData::Diagnostics(diagnostics)))
    }
}
