use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::Path;

use crate::error::{Result, StudyError};
use crate::store::Medium;

/// SQLite-backed key-value medium. Values are JSON text.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        Ok(())
    }

    pub fn key_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count)
    }

    fn read_in(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match value {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_in(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

impl Medium for Database {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Self::read_in(&self.conn, key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        Self::write_in(&self.conn, key, value)
    }

    fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        // Immediate so a second connection can't interleave between read and write
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let current = match Self::read_in(&tx, key)? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| StudyError::CorruptValue {
                    key: key.to_string(),
                })?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StudyError::CorruptValue {
                key: key.to_string(),
            })?;

        Self::write_in(&tx, key, &next.to_string())?;
        tx.commit()?;

        Ok(next)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM kv WHERE substr(key, 1, ?1) = ?2 ORDER BY key",
        )?;

        let len = prefix.chars().count() as i64;
        let rows = stmt.query_map(params![len, prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let entries = rows.collect::<rusqlite::Result<Vec<(String, String)>>>()?;

        Ok(entries)
    }

    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let len = prefix.chars().count() as i64;
        let rows = self.conn.execute(
            "DELETE FROM kv WHERE substr(key, 1, ?1) = ?2",
            params![len, prefix],
        )?;
        Ok(rows)
    }
}
