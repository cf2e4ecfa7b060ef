//! Advisory field locks reflected from the presence subsystem.
//!
//! The table mirrors which user currently holds which field of which
//! entity. It is advisory only: the server remains the source of truth,
//! and the absence of a local record does not guarantee the field is
//! free. The data layer consults it before a `patch` so a user gets told
//! "locked by Jane" before any network round-trip.

use std::collections::HashMap;
use std::sync::Mutex;

/// One advisory lock record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLock {
    pub entity_id: String,
    pub field: String,
    pub holder_user_id: String,
}

/// Thread-safe view of the advisory locks for the current session.
#[derive(Debug, Default)]
pub struct LockTable {
    inner: Mutex<HashMap<(String, String), String>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table with a fresh presence snapshot.
    pub fn replace(&self, locks: Vec<FieldLock>) {
        let mut inner = self.inner.lock().unwrap();
        inner.clear();
        for lock in locks {
            inner.insert((lock.entity_id, lock.field), lock.holder_user_id);
        }
    }

    /// Record a single lock (from a LOCK_ACK style notification).
    pub fn insert(&self, lock: FieldLock) {
        self.inner
            .lock()
            .unwrap()
            .insert((lock.entity_id, lock.field), lock.holder_user_id);
    }

    /// Drop a single lock.
    pub fn release(&self, entity_id: &str, field: &str) {
        self.inner
            .lock()
            .unwrap()
            .remove(&(entity_id.to_string(), field.to_string()));
    }

    /// Current holder of a field, if any.
    pub fn holder(&self, entity_id: &str, field: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .get(&(entity_id.to_string(), field.to_string()))
            .cloned()
    }

    /// The holder's id when the field is locked by someone other than
    /// `user_id`.
    pub fn held_by_other(&self, entity_id: &str, field: &str, user_id: &str) -> Option<String> {
        self.holder(entity_id, field)
            .filter(|holder| holder != user_id)
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
