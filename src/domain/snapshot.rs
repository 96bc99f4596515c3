//! The observable state of the repository store.
//! No I/O - all functions are data in, data out.

use super::types::{BranchRecord, CommitRecord, RepositoryRecord, RepositoryStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Status, history and branches fetched for one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryDetails {
    pub status: Option<RepositoryStatus>,
    pub commits: Vec<CommitRecord>,
    pub branches: Vec<BranchRecord>,
}

/// Complete state held by the store at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositorySnapshot {
    /// Tracked repositories, at most one per location, in insertion order.
    pub repositories: Vec<RepositoryRecord>,
    pub selected_repository: Option<String>,
    /// Detail cache keyed by location. Entries are only written by fetches
    /// for that location, so a selection change never exposes another
    /// repository's data.
    pub details: BTreeMap<String, RepositoryDetails>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl RepositorySnapshot {
    pub fn is_tracked(&self, location: &str) -> bool {
        self.repositories.iter().any(|r| r.path == location)
    }

    pub fn repository(&self, location: &str) -> Option<&RepositoryRecord> {
        self.repositories.iter().find(|r| r.path == location)
    }

    /// Tracked locations in order; this is what gets persisted.
    pub fn locations(&self) -> Vec<String> {
        self.repositories.iter().map(|r| r.path.clone()).collect()
    }

    pub fn selected_details(&self) -> Option<&RepositoryDetails> {
        self.selected_repository
            .as_deref()
            .and_then(|location| self.details.get(location))
    }

    pub fn status(&self) -> Option<&RepositoryStatus> {
        self.selected_details().and_then(|d| d.status.as_ref())
    }

    pub fn commits(&self) -> &[CommitRecord] {
        self.selected_details()
            .map(|d| d.commits.as_slice())
            .unwrap_or(&[])
    }

    pub fn branches(&self) -> &[BranchRecord] {
        self.selected_details()
            .map(|d| d.branches.as_slice())
            .unwrap_or(&[])
    }

    /// Append a record unless its location is already tracked.
    pub fn push_record(&mut self, record: RepositoryRecord) -> bool {
        if self.is_tracked(&record.path) {
            return false;
        }
        self.repositories.push(record);
        true
    }

    /// Replace the record with the same location, keeping its position.
    pub fn replace_record(&mut self, record: RepositoryRecord) -> bool {
        match self.repositories.iter_mut().find(|r| r.path == record.path) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Untrack a location, dropping its cached details and clearing the
    /// selection if it pointed there.
    pub fn remove_location(&mut self, location: &str) -> bool {
        let before = self.repositories.len();
        self.repositories.retain(|r| r.path != location);
        self.details.remove(location);
        if self.selected_repository.as_deref() == Some(location) {
            self.selected_repository = None;
        }
        self.repositories.len() != before
    }
}
