//! The audit log

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use veil_storage::WriteQueue;

use crate::entry::{AccessStatus, AuditEntry, AuditEvent};
use crate::export::{self, ExportFormat};
use crate::filter::AuditFilter;
use crate::Result;

pub const DEFAULT_CAPACITY: usize = 10_000;

/// Aggregates over the current log contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub allowed: usize,
    pub blocked: usize,
    pub errors: usize,
    pub by_domain: BTreeMap<String, usize>,
    pub by_capability: BTreeMap<String, usize>,
}

struct LogState {
    entries: VecDeque<AuditEntry>,
    next_seq: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

pub struct AuditLog {
    /// Entries plus sequence bookkeeping, mutated under one lock
    state: Arc<Mutex<LogState>>,
    capacity: usize,
    /// Best-effort durable copy
    mirror: Option<WriteQueue>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            state: Arc::new(Mutex::new(LogState {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                next_seq: 1,
                last_timestamp: None,
            })),
            capacity,
            mirror: None,
        }
    }

    /// Mirror every future entry through `writer`.
    pub fn with_mirror(mut self, writer: WriteQueue) -> Self {
        self.mirror = Some(writer);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an entry, evicting the oldest one when over capacity.
    pub fn record(&self, event: AuditEvent) -> AuditEntry {
        let mut state = self.state.lock();

        let seq = state.next_seq;
        state.next_seq += 1;

        // Wall clocks can step backwards; keep timestamps non-decreasing
        let now = Utc::now();
        let timestamp = match state.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_timestamp = Some(timestamp);

        let entry = AuditEntry::from_event(seq, timestamp, event);
        state.entries.push_back(entry.clone());

        while state.entries.len() > self.capacity {
            state.entries.pop_front();
        }

        // Queued while still holding the lock so the mirror sees seq order
        if let Some(mirror) = &self.mirror {
            mirror.append_audit(entry.to_row());
        }

        tracing::debug!(
            seq = entry.seq,
            domain = %entry.domain,
            capability = %entry.capability,
            status = %entry.status,
            "Recorded audit entry"
        );

        entry
    }

    /// Entries matching `filter`, in insertion order.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let state = self.state.lock();
        let skip = state.entries.len().saturating_sub(limit);
        state.entries.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> AuditStats {
        let state = self.state.lock();
        let mut stats = AuditStats {
            total: state.entries.len(),
            ..AuditStats::default()
        };

        for entry in &state.entries {
            match entry.status {
                AccessStatus::Allowed => stats.allowed += 1,
                AccessStatus::Blocked => stats.blocked += 1,
                AccessStatus::Error => stats.errors += 1,
            }
            *stats.by_domain.entry(entry.domain.clone()).or_insert(0) += 1;
            *stats
                .by_capability
                .entry(entry.capability.clone())
                .or_insert(0) += 1;
        }

        stats
    }

    /// Drop every entry here and, best effort, in the mirror.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();

        if let Some(mirror) = &self.mirror {
            mirror.clear_audit();
        }

        tracing::info!(dropped, "Cleared audit log");
    }

    pub fn export(&self, format: ExportFormat) -> Result<String> {
        let state = self.state.lock();
        export::render(format, state.entries.iter())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Clone for AuditLog {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            capacity: self.capacity,
            mirror: self.mirror.clone(),
        }
    }
}
