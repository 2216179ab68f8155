//! Bounded undo log.

use std::collections::VecDeque;

use savate_session::Fighters;
use serde::{Deserialize, Serialize};

/// Entries kept per actor.
pub const HISTORY_CAPACITY: usize = 50;

/// Ring buffer of snapshots: pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl<T> History<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Delegate-side undo entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegateAction {
    FighterNames {
        #[serde(rename = "previousValue")]
        previous: Fighters,
        #[serde(rename = "newValue")]
        new: Fighters,
    },
}

impl DelegateAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FighterNames { .. } => "MODIFICATION NOMS TIREURS",
        }
    }
}
