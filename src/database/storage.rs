// Insert and delete operations

use rusqlite::params;
use tracing::debug;

use super::{SymbolDatabase, SymbolRecord};
use crate::error::Result;

impl SymbolDatabase {
    /// Insert a single occurrence. Records with an empty USR are dropped;
    /// duplicate-key violations are swallowed (re-indexing is idempotent).
    pub fn insert_single(&mut self, record: &SymbolRecord) -> Result<()> {
        if record.usr.is_empty() {
            return Ok(());
        }
        self.ensure_transaction()?;
        let outcome = self.conn()?.execute(
            "INSERT INTO symbol VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.filename,
                record.line,
                record.column,
                record.usr,
                record.context,
                record.kind,
                record.is_definition,
            ],
        );
        match outcome {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every row recorded for `filename` (project-relative).
    pub fn delete(&mut self, filename: &str) -> Result<()> {
        self.ensure_transaction()?;
        let deleted = self
            .conn()?
            .execute("DELETE FROM symbol WHERE filename = ?1", params![filename])?;
        debug!("Deleted {} rows for '{}'", deleted, filename);
        Ok(())
    }

    /// Remove every row but keep the file.
    pub fn delete_all(&mut self) -> Result<()> {
        self.ensure_transaction()?;
        let deleted = self.conn()?.execute("DELETE FROM symbol", [])?;
        debug!("Deleted all {} rows", deleted);
        Ok(())
    }
}
