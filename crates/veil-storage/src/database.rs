//! Database connection and operations

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::Result;

/// One mirrored audit entry, flattened to the column layout of `audit_log`.
///
/// `timestamp` must be produced by [`AuditRow::format_timestamp`] so that
/// lexical ordering in SQLite matches chronological ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub seq: i64,
    pub timestamp: String,
    pub event_type: String,
    pub domain: String,
    pub capability: String,
    pub status: String,
    pub details: String,
    pub trace: Option<String>,
}

impl AuditRow {
    pub fn format_timestamp(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode lets the writer thread and startup reads coexist
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })
    }

    /// Read a JSON-encoded setting. A missing key is `Ok(None)`; a value that
    /// fails to parse is an error so callers can decide how to recover.
    pub fn get_json_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_setting(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.set_setting(key, &serialized)
    }

    // === Audit mirror ===

    pub fn insert_audit(&self, row: &AuditRow) -> Result<i64> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO audit_log
                 (seq, timestamp, event_type, domain, capability, status, details, trace)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.seq,
                    row.timestamp,
                    row.event_type,
                    row.domain,
                    row.capability,
                    row.status,
                    row.details,
                    row.trace,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn clear_audit(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM audit_log", [])?;
            Ok(())
        })
    }

    pub fn audit_row_count(&self) -> Result<i64> {
        self.with_connection(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
            Ok(count)
        })
    }

    /// Mirrored rows for one domain, oldest first.
    pub fn audit_rows_for_domain(&self, domain: &str) -> Result<Vec<AuditRow>> {
        self.query_audit(
            "SELECT seq, timestamp, event_type, domain, capability, status, details, trace
             FROM audit_log WHERE domain = ?1 ORDER BY id",
            domain.to_string(),
        )
    }

    /// Mirrored rows recorded at or after `since`, oldest first.
    pub fn audit_rows_since(&self, since: &DateTime<Utc>) -> Result<Vec<AuditRow>> {
        self.query_audit(
            "SELECT seq, timestamp, event_type, domain, capability, status, details, trace
             FROM audit_log WHERE timestamp >= ?1 ORDER BY id",
            AuditRow::format_timestamp(since),
        )
    }

    fn query_audit(&self, sql: &str, param: String) -> Result<Vec<AuditRow>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;

            let rows: Vec<AuditRow> = stmt
                .query_map([param], |row| {
                    Ok(AuditRow {
                        seq: row.get(0)?,
                        timestamp: row.get(1)?,
                        event_type: row.get(2)?,
                        domain: row.get(3)?,
                        capability: row.get(4)?,
                        status: row.get(5)?,
                        details: row.get(6)?,
                        trace: row.get(7)?,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(rows)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(seq: i64, domain: &str, at: DateTime<Utc>) -> AuditRow {
        AuditRow {
            seq,
            timestamp: AuditRow::format_timestamp(&at),
            event_type: "access".to_string(),
            domain: domain.to_string(),
            capability: "document.cookie".to_string(),
            status: "blocked".to_string(),
            details: "{}".to_string(),
            trace: None,
        }
    }

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            let count: i32 =
                conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
        assert_eq!(db.audit_row_count().unwrap(), 0);
    }

    #[test]
    fn test_settings_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("missing").unwrap(), None);

        db.set_json_setting("numbers", &vec![1, 2, 3]).unwrap();
        let numbers: Option<Vec<i32>> = db.get_json_setting("numbers").unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        db.set_setting("broken", "{not json").unwrap();
        assert!(db.get_json_setting::<Vec<i32>>("broken").is_err());
    }

    #[test]
    fn test_audit_lookup_by_domain_and_time() {
        let db = Database::open_in_memory().unwrap();
        let start = Utc::now();

        db.insert_audit(&row(1, "a.example", start)).unwrap();
        db.insert_audit(&row(2, "b.example", start + Duration::seconds(1)))
            .unwrap();
        db.insert_audit(&row(3, "a.example", start + Duration::seconds(2)))
            .unwrap();

        let for_a = db.audit_rows_for_domain("a.example").unwrap();
        assert_eq!(for_a.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 3]);

        let recent = db
            .audit_rows_since(&(start + Duration::seconds(1)))
            .unwrap();
        assert_eq!(recent.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![2, 3]);

        db.clear_audit().unwrap();
        assert_eq!(db.audit_row_count().unwrap(), 0);
    }
}
