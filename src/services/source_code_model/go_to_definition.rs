// Definition navigation. The parser is asked first; when it cannot see the
// definition inside the translation unit, the indexed symbol store is
// consulted by USR.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::database::SymbolDatabase;
use crate::parser::CxxParser;
use crate::protocol::{Location, ResultData, Value, int_arg, str_arg};

pub struct GoToDefinition {
    parser: Arc<CxxParser>,
    symbol_db: Arc<Mutex<SymbolDatabase>>,
    project_root_directory: PathBuf,
}

impl GoToDefinition {
    pub fn new(
        parser: Arc<CxxParser>,
        symbol_db: Arc<Mutex<SymbolDatabase>>,
        project_root_directory: &Path,
    ) -> Self {
        Self {
            parser,
            symbol_db,
            project_root_directory: project_root_directory.to_path_buf(),
        }
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
        let original = Path::new(original);
        let contents = Path::new(contents);
        let Some(tunit) = self.parser.parse(contents, original) else {
            return (false, None);
        };
        let Some(cursor) = self.parser.cursor_at(&tunit, line as u32, column as u32) else {
            return (false, None);
        };

        let mut definition = self.parser.definition_of(&tunit, &cursor);

        // If unsuccessful, try once more by extracting the definition from
        // the indexed symbol database.
        if definition.is_none() {
            let db = self.symbol_db.lock().unwrap_or_else(|e| e.into_inner());
            match db.get_definition(cursor.lookup_usr()) {
                Ok(rows) => {
                    definition = rows.first().map(|row| Location {
                        filename: self.project_root_directory.join(&row.filename),
                        line: row.line,
                        column: row.column,
                    });
                }
                Err(e) => debug!("Symbol database lookup failed: {}", e),
            }
        }

        let Some(mut definition) = definition else {
            return (false, None);
        };

        // When editing a not-yet-saved buffer, a definition that resolves
        // into that buffer is reported under the original filename, so the
        // editor can still jump to it.
        if contents != original && definition.filename == contents {
            definition.filename = original.to_path_buf();
        }

        (true, Some(ResultData::Definition(definition)))
    }
}
