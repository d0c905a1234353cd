use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::{RelationshipId, SuggestionId};

/// What reverting a transition requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// Restore `dismissed → pending`.
    RevertDismiss,
    /// Restore `linked → pending`, removing the created relationship.
    RevertLink { relationship: RelationshipId },
}

/// A live undo window for one suggestion.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub suggestion: SuggestionId,
    pub action: UndoAction,
    pub deadline: Instant,
}

/// Outcome of claiming an undo window.
#[derive(Debug)]
pub enum UndoClaim {
    /// The window was open; the entry has been removed and the caller
    /// must now apply the revert.
    Active(UndoEntry),
    /// The window had already expired; the stale entry was finalized.
    Expired,
    /// No window was ever registered (or it was already finalized).
    Missing,
}

/// Arena of undo windows keyed by suggestion id.
///
/// A later action on the same suggestion supersedes any outstanding
/// window: registering always cancels the previous entry. Expiry is lazy
/// — correctness needs only the deadline comparison at claim time;
/// [`sweep_expired`](Self::sweep_expired) exists for hygiene.
#[derive(Debug, Default)]
pub struct UndoRegistry {
    entries: HashMap<SuggestionId, UndoEntry>,
}

impl UndoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window, superseding any outstanding one for this id.
    pub fn register(&mut self, suggestion: SuggestionId, action: UndoAction, window: Duration) {
        self.entries.insert(
            suggestion,
            UndoEntry {
                suggestion,
                action,
                deadline: Instant::now() + window,
            },
        );
    }

    /// Cancel without applying (the transition became permanent through
    /// another path, e.g. a merge).
    pub fn cancel(&mut self, suggestion: SuggestionId) -> Option<UndoEntry> {
        self.entries.remove(&suggestion)
    }

    /// Claim the window for an undo attempt.
    pub fn claim(&mut self, suggestion: SuggestionId, now: Instant) -> UndoClaim {
        match self.entries.remove(&suggestion) {
            Some(entry) if now <= entry.deadline => UndoClaim::Active(entry),
            Some(_) => UndoClaim::Expired,
            None => UndoClaim::Missing,
        }
    }

    /// Drop every expired entry, finalizing those transitions. Returns
    /// the finalized entries.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<UndoEntry> {
        let expired: Vec<SuggestionId> = self
            .entries
            .values()
            .filter(|e| now > e.deadline)
            .map(|e| e.suggestion)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn claim_within_window_is_active() {
        let mut registry = UndoRegistry::new();
        let id = Uuid::now_v7();
        registry.register(id, UndoAction::RevertDismiss, Duration::from_secs(10));
        match registry.claim(id, Instant::now()) {
            UndoClaim::Active(entry) => assert_eq!(entry.action, UndoAction::RevertDismiss),
            other => panic!("expected active claim, got {other:?}"),
        }
        // Claiming removes the entry.
        assert!(matches!(
            registry.claim(id, Instant::now()),
            UndoClaim::Missing
        ));
    }

    #[test]
    fn claim_after_deadline_is_expired() {
        let mut registry = UndoRegistry::new();
        let id = Uuid::now_v7();
        registry.register(id, UndoAction::RevertDismiss, Duration::ZERO);
        let later = Instant::now() + Duration::from_millis(5);
        assert!(matches!(registry.claim(id, later), UndoClaim::Expired));
    }

    #[test]
    fn register_supersedes_previous_window() {
        let mut registry = UndoRegistry::new();
        let id = Uuid::now_v7();
        let rel = Uuid::now_v7();
        registry.register(id, UndoAction::RevertDismiss, Duration::from_secs(10));
        registry.register(
            id,
            UndoAction::RevertLink { relationship: rel },
            Duration::from_secs(5),
        );
        assert_eq!(registry.len(), 1);
        match registry.claim(id, Instant::now()) {
            UndoClaim::Active(entry) => {
                assert_eq!(entry.action, UndoAction::RevertLink { relationship: rel });
            }
            other => panic!("expected active claim, got {other:?}"),
        }
    }

    #[test]
    fn sweep_finalizes_only_expired() {
        let mut registry = UndoRegistry::new();
        let expired_id = Uuid::now_v7();
        let live_id = Uuid::now_v7();
        registry.register(expired_id, UndoAction::RevertDismiss, Duration::ZERO);
        registry.register(live_id, UndoAction::RevertDismiss, Duration::from_secs(60));

        let swept = registry.sweep_expired(Instant::now() + Duration::from_millis(5));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].suggestion, expired_id);
        assert_eq!(registry.len(), 1);
    }
}
