// Include navigation: the header included at a given source line.

use std::path::Path;
use std::sync::Arc;

use crate::parser::CxxParser;
use crate::protocol::{ResultData, Value, int_arg, str_arg};

pub struct GoToInclude {
    parser: Arc<CxxParser>,
}

impl GoToInclude {
    pub fn new(parser: Arc<CxxParser>) -> Self {
        Self { parser }
    }

    pub fn handle(&self, args: &[Value]) -> (bool, Option<ResultData>) {
        let (Some(original), Some(contents), Some(line)) =
            (str_arg(args, 0), str_arg(args, 1), int_arg(args, 2))
        else {
            return (false, None);
        };
        let Some(tunit) = self.parser.parse(Path::new(contents), Path::new(original)) else {
            return (false, None);
        };
        let hit = self
            .parser
            .top_level_includes(&tunit)
            .into_iter()
            .find(|(_, include_line, _)| i64::from(*include_line) == line);
        match hit {
            Some((filename, _, _)) => (true, Some(ResultData::Include(filename))),
            None => (false, None),
        }
    }
}
