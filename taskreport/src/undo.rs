//! One-slot undo cache for batch deletes.
//!
//! Process memory only; nothing here survives a restart. Each user gets a
//! single slot holding the last task matched by their most recent batch
//! delete; a new batch delete overwrites it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use crate::entity::task;

/// Field-for-field copy of a deleted task, minus its row identity.
/// Restoring inserts a brand-new row with a fresh id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub status: String,
}

impl From<&task::Model> for TaskSnapshot {
    fn from(model: &task::Model) -> Self {
        Self {
            title: model.title.clone(),
            description: model.description.clone(),
            start_date: model.start_date,
            due_date: model.due_date,
            completion_date: model.completion_date,
            status: model.status.clone(),
        }
    }
}

/// Per-user single-slot store for the most recent batch delete.
///
/// Thread-safe via interior `RwLock`; clones share the same slots.
#[derive(Debug, Default, Clone)]
pub struct UndoCache {
    slots: Arc<RwLock<HashMap<i32, TaskSnapshot>>>,
}

impl UndoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `snapshot` as the user's last deleted task, overwriting any
    /// previous slot for that user.
    pub fn remember(&self, user_id: i32, snapshot: TaskSnapshot) {
        self.slots.write().unwrap().insert(user_id, snapshot);
    }

    /// Take the user's slot, leaving it empty.
    pub fn take(&self, user_id: i32) -> Option<TaskSnapshot> {
        self.slots.write().unwrap().remove(&user_id)
    }
}
