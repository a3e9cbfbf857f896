//! Fire-and-forget write queue
//!
//! Every durable write issued by the engine is queued here and applied on a
//! dedicated thread, so the capability path never waits on SQLite. Failures
//! are reported once through `tracing` and then demoted to debug output; the
//! in-memory state of the caller stays authoritative either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::database::{AuditRow, Database};
use crate::error::StorageError;
use crate::Result;

enum WriteOp {
    Setting { key: String, value: String },
    AppendAudit(AuditRow),
    ClearAudit,
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteOp>,
    degraded: Arc<AtomicBool>,
}

impl WriteQueue {
    /// Start the writer thread. It exits once every queue handle is dropped.
    pub fn spawn(db: Database) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let degraded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&degraded);

        std::thread::Builder::new()
            .name("veil-storage-writer".to_string())
            .spawn(move || {
                while let Some(op) = rx.blocking_recv() {
                    if let Err(e) = apply(&db, op) {
                        report_failure(&flag, &e);
                    }
                }
                tracing::debug!("Storage writer stopped");
            })?;

        Ok(Self { tx, degraded })
    }

    pub fn put_setting(&self, key: &str, value: String) {
        self.send(WriteOp::Setting {
            key: key.to_string(),
            value,
        });
    }

    pub fn append_audit(&self, row: AuditRow) {
        self.send(WriteOp::AppendAudit(row));
    }

    pub fn clear_audit(&self) {
        self.send(WriteOp::ClearAudit);
    }

    /// Block until every write queued before this call has been applied.
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriteOp::Flush(done_tx))
            .map_err(|_| StorageError::WriterClosed)?;
        done_rx.blocking_recv().map_err(|_| StorageError::WriterClosed)
    }

    /// True once any durable write has failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn send(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            report_failure(&self.degraded, &StorageError::WriterClosed);
        }
    }
}

fn apply(db: &Database, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::Setting { key, value } => db.set_setting(&key, &value),
        WriteOp::AppendAudit(row) => db.insert_audit(&row).map(|_| ()),
        WriteOp::ClearAudit => db.clear_audit(),
        WriteOp::Flush(done) => {
            let _ = done.send(());
            Ok(())
        }
    }
}

fn report_failure(flag: &AtomicBool, error: &StorageError) {
    if !flag.swap(true, Ordering::Relaxed) {
        tracing::warn!(
            error = %error,
            "Durable storage write failed; continuing with in-memory state only"
        );
    } else {
        tracing::debug!(error = %error, "Durable storage write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(seq: i64) -> AuditRow {
        AuditRow {
            seq,
            timestamp: AuditRow::format_timestamp(&chrono::Utc::now()),
            event_type: "access".to_string(),
            domain: "example.com".to_string(),
            capability: "localStorage".to_string(),
            status: "allowed".to_string(),
            details: "{}".to_string(),
            trace: None,
        }
    }

    #[test]
    fn test_queued_writes_land_after_flush() {
        let db = Database::open_in_memory().unwrap();
        let queue = WriteQueue::spawn(db.clone()).unwrap();

        queue.put_setting("consent_permissions", "{}".to_string());
        queue.append_audit(sample_row(1));
        queue.append_audit(sample_row(2));
        queue.flush().unwrap();

        assert_eq!(
            db.get_setting("consent_permissions").unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(db.audit_row_count().unwrap(), 2);

        queue.clear_audit();
        queue.flush().unwrap();
        assert_eq!(db.audit_row_count().unwrap(), 0);
        assert!(!queue.is_degraded());
    }

    #[test]
    fn test_failed_write_marks_queue_degraded() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            conn.execute("DROP TABLE audit_log", [])?;
            Ok(())
        })
        .unwrap();

        let queue = WriteQueue::spawn(db).unwrap();
        queue.append_audit(sample_row(1));
        queue.flush().unwrap();

        assert!(queue.is_degraded());
    }
}
