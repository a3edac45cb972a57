// Merging per-child stores into the project store

use std::path::PathBuf;

use tracing::{debug, warn};

use super::SymbolDatabase;
use crate::error::Result;

impl SymbolDatabase {
    /// Stream every row of each secondary store into this one, committing
    /// once per secondary. A secondary that cannot be opened or read is
    /// skipped; its rows are simply absent from the merge.
    pub fn insert_from(&mut self, secondary_stores: &[PathBuf]) -> Result<()> {
        for path in secondary_stores {
            let secondary = match SymbolDatabase::with_file(path) {
                Ok(db) => db,
                Err(e) => {
                    warn!("Skipping unreadable store '{}': {}", path.display(), e);
                    continue;
                }
            };
            let rows = match secondary.get_all() {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Skipping unreadable store '{}': {}", path.display(), e);
                    continue;
                }
            };
            debug!("Merging {} rows from '{}'", rows.len(), path.display());
            for record in &rows {
                self.insert_single(record)?;
            }
            self.flush()?;
        }
        Ok(())
    }
}
