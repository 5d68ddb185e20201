//! Export selection
//!
//! The set of topic ids a session has checked for batch export. It is a
//! plain value owned by the caller and handed to the exporters; an empty
//! selection means "export everything".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Topic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    ids: BTreeSet<i64>,
}

impl Selection {
    /// The empty selection, which exports all topics
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn select(&mut self, id: i64) {
        self.ids.insert(id);
    }

    pub fn deselect(&mut self, id: i64) {
        self.ids.remove(&id);
    }

    /// Flip one id, returning whether it is now selected
    pub fn toggle(&mut self, id: i64) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Select every topic of a listing (the "select all" checkbox)
    pub fn select_listed(&mut self, topics: &[Topic]) {
        self.ids.extend(topics.iter().map(|t| t.id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Selected ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
