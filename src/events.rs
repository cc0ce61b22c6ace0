use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// what happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    // quote events
    QuoteCreated,
    QuoteSuperseded,
    QuoteRevised,

    // tuition payment events
    PaymentRecorded,
    PaymentEdited,
    PaymentDeleted,
    PaymentRestored,

    // itemized payment events
    OtherPaymentRecorded,
    OtherPaymentEdited,
    OtherPaymentDeleted,
}

/// kind of entity an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Quote,
    Payment,
    OtherPayment,
}

/// one activity-log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
}

/// fire-and-forget destination for activity entries
///
/// Implementations must not fail the caller; a sink that can't write drops
/// the entry.
pub trait ActivitySink: Send + Sync {
    fn record(&self, entry: ActivityEntry);
}

/// in-memory activity log
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn take_entries(&self) -> Vec<ActivityEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *entries)
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn entries_for(&self, entity_id: Uuid) -> Vec<ActivityEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl ActivitySink for ActivityLog {
    fn record(&self, entry: ActivityEntry) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
    }
}

/// writes entries to the tracing subscriber instead of storing them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn record(&self, entry: ActivityEntry) {
        info!(
            target: "activity",
            action = ?entry.action,
            entity_type = ?entry.entity_type,
            entity_id = %entry.entity_id,
            user = %entry.user,
            timestamp = %entry.timestamp,
            "{}",
            entry.details
        );
    }
}
