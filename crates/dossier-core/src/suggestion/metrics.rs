use serde::{Deserialize, Serialize};

/// Counters for resolution-engine observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionMetrics {
    /// Suggestions created by generation.
    pub suggestions_created: u64,

    /// Suggestions dismissed by user action.
    pub suggestions_dismissed: u64,

    /// Suggestions linked by user action.
    pub suggestions_linked: u64,

    /// Suggestions merged by user action.
    pub suggestions_merged: u64,

    /// Undo windows exercised.
    pub undos_applied: u64,

    /// Undo windows that expired and were finalized.
    pub undos_expired: u64,

    /// Suggestions invalidated because a referent disappeared.
    pub suggestions_invalidated: u64,

    /// Merges aborted on a version conflict.
    pub merge_conflicts: u64,
}

impl ResolutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_suggestions_created(&mut self, count: u64) {
        self.suggestions_created += count;
    }

    pub fn add_suggestions_dismissed(&mut self, count: u64) {
        self.suggestions_dismissed += count;
    }

    pub fn add_suggestions_linked(&mut self, count: u64) {
        self.suggestions_linked += count;
    }

    pub fn add_suggestions_merged(&mut self, count: u64) {
        self.suggestions_merged += count;
    }

    pub fn add_undos_applied(&mut self, count: u64) {
        self.undos_applied += count;
    }

    pub fn add_undos_expired(&mut self, count: u64) {
        self.undos_expired += count;
    }

    pub fn add_suggestions_invalidated(&mut self, count: u64) {
        self.suggestions_invalidated += count;
    }

    pub fn add_merge_conflicts(&mut self, count: u64) {
        self.merge_conflicts += count;
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Suggestions: {} created, {} dismissed, {} linked, {} merged, {} invalidated | \
             Undo: {} applied, {} expired | Merge conflicts: {}",
            self.suggestions_created,
            self.suggestions_dismissed,
            self.suggestions_linked,
            self.suggestions_merged,
            self.suggestions_invalidated,
            self.undos_applied,
            self.undos_expired,
            self.merge_conflicts
        )
    }
}
