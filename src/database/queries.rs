// Query operations

use rusqlite::params;

use super::{SymbolDatabase, SymbolRecord};
use crate::error::Result;

const SYMBOL_COLUMNS: &str = "filename, line, column, usr, context, kind, is_definition";

impl SymbolDatabase {
    /// Every row in the store.
    pub fn get_all(&self) -> Result<Vec<SymbolRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM symbol", SYMBOL_COLUMNS))?;
        let rows = stmt.query_map([], |row| Self::record_from_row(row))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Every occurrence of the entity identified by `usr`.
    pub fn get_by_usr(&self, usr: &str) -> Result<Vec<SymbolRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM symbol WHERE usr = ?1",
            SYMBOL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![usr], |row| Self::record_from_row(row))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Occurrences of `usr` that are defining declarations.
    pub fn get_definition(&self, usr: &str) -> Result<Vec<SymbolRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM symbol WHERE usr = ?1 AND is_definition = 1",
            SYMBOL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![usr], |row| Self::record_from_row(row))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
