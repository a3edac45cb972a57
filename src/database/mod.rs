// cxxd's symbol database
//
// Persistent table of indexed symbol occurrences, stored in SQLite at the
// project root. Written by the indexer (and its short-lived children), read
// by find-all-references and go-to-definition.

pub mod bulk;
pub mod queries;
pub mod schema;
pub mod storage;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Row};

use crate::error::{Error, Result};

/// File name of the on-disk store, always directly under the project root.
pub const SYMBOL_DB_NAME: &str = ".cxxd_index.db";

/// One row of the `symbol` table.
///
/// `filename` is stored relative to the indexed project root, never absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRecord {
    pub filename: String,
    pub line: u32,
    pub column: u32,
    pub usr: String,
    pub context: String,
    pub kind: i32,
    pub is_definition: bool,
}

/// SQLite-backed symbol store. All operations on a closed store fail with
/// [`Error::StoreClosed`].
pub struct SymbolDatabase {
    conn: Option<Connection>,
    filename: Option<PathBuf>,
    in_transaction: bool,
}

impl Default for SymbolDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolDatabase {
    pub fn new() -> Self {
        Self {
            conn: None,
            filename: None,
            in_transaction: false,
        }
    }

    pub fn with_file(path: &Path) -> Result<Self> {
        let mut db = Self::new();
        db.open(path)?;
        Ok(db)
    }

    /// Open the store at `path`. A no-op if a connection is already held.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        if self.conn.is_none() {
            self.conn = Some(Connection::open(path)?);
            self.filename = Some(path.to_path_buf());
        }
        Ok(())
    }

    /// Drop the connection. Uncommitted writes are rolled back.
    pub fn close(&mut self) {
        self.conn = None;
        self.filename = None;
        self.in_transaction = false;
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::StoreClosed)
    }

    /// Writes buffer inside an implicit transaction until [`Self::flush`].
    pub(crate) fn ensure_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn()?.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    /// Commit pending writes.
    pub fn flush(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn()?.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SymbolRecord> {
        Ok(SymbolRecord {
            filename: row.get(0)?,
            line: row.get(1)?,
            column: row.get(2)?,
            usr: row.get(3)?,
            context: row.get(4)?,
            kind: row.get(5)?,
            is_definition: row.get(6)?,
        })
    }
}
