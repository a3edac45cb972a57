// Type deduction: the declared type of the entity under the cursor.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::parser::CxxParser;
use crate::protocol::{ResultData, Value, int_arg, str_arg};

pub struct TypeDeduction {
    parser: Arc<CxxParser>,
}

impl TypeDeduction {
    pub fn new(parser: Arc<CxxParser>) -> Self {
        Self { parser }
    }

    pub fn handle(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let (Some(original), Some(contents), Some(line), Some(column)) = (
            str_arg(args, 0),
            str_arg(args, 1),
            int_arg(args, 2),
            int_arg(args, 3),
        ) else {
            return (false, None);
        };
        let Some(tunit) = self.parser.parse(Path::new(contents), Path::new(original)) else {
            return (false, None);
        };
        let deduced = self
            .parser
            .cursor_at(&tunit, line as u32, column as u32)
            .and_then(|cursor| self.parser.deduced_type(&tunit, &cursor));
        match deduced {
            Some(type_text) => (true, Some(ResultData::DeducedType(type_text))),
            None => {
                debug!("No deducible type at {}:{}:{}", original, line, column);
                (false, None)
            }
        }
    }
}
