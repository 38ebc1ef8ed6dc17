//! In-memory cache of fetched subscription content.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Latest fetched body per subscription id. Opaque text, never parsed.
#[derive(Debug, Default)]
pub struct ContentStore {
    entries: RwLock<HashMap<i64, String>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` for `sub_id`, replacing any earlier fetch.
    pub fn store(&self, sub_id: i64, content: String) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sub_id, content);
    }

    pub fn get(&self, sub_id: i64) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&sub_id)
            .cloned()
    }

    pub fn remove(&self, sub_id: i64) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&sub_id)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
