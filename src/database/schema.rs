// Schema creation and version bookkeeping

use rusqlite::params;
use tracing::debug;

use super::SymbolDatabase;
use crate::error::Result;

pub const VERSION_MAJOR: i64 = 0;
pub const VERSION_MINOR: i64 = 1;

impl SymbolDatabase {
    /// Create the `symbol` and `version` tables. Idempotent; the version row
    /// is written exactly once, when the schema first comes into existence.
    pub fn create_data_model(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS symbol (
                filename        TEXT,
                line            INTEGER,
                column          INTEGER,
                usr             TEXT,
                context         TEXT,
                kind            INTEGER,
                is_definition   BOOLEAN,
                PRIMARY KEY(filename, usr, line)
             )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS version (
                major INTEGER,
                minor INTEGER,
                PRIMARY KEY(major, minor)
             )",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO version VALUES (?1, ?2)",
            params![VERSION_MAJOR, VERSION_MINOR],
        )?;
        debug!("Symbol database data model in place");
        Ok(())
    }

    /// The `(major, minor)` recorded at schema creation. `None` when the
    /// version table is absent or empty (a pre-versioning store).
    pub fn version(&self) -> Result<Option<(i64, i64)>> {
        let conn = self.conn()?;
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'version'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Ok(None);
        }
        let mut stmt = conn.prepare("SELECT major, minor FROM version LIMIT 1")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
            None => Ok(None),
        }
    }

    /// True when the version row exists and matches the schema this build
    /// understands.
    pub fn version_matches(&self) -> Result<bool> {
        Ok(self.version()? == Some((VERSION_MAJOR, VERSION_MINOR)))
    }
}
