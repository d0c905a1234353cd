use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::{ResolveError, Result};
use crate::matching::{MatchEngine, MatchQuery};
use crate::merge::MergeCoordinator;
use crate::repository::{Repository, SuggestionFilter};
use crate::suggestion::config::SuggestionConfig;
use crate::suggestion::metrics::ResolutionMetrics;
use crate::suggestion::undo::{UndoAction, UndoClaim, UndoRegistry};
use crate::types::{
    DataItem, EntityId, MergeRecord, OwnerRef, RelationKind, Relationship, Suggestion,
    SuggestionId, SuggestionStatus,
};

/// Dismiss reason written when a suggestion's referent disappeared and
/// the suggestion was invalidated on read.
pub const INVALIDATED_REASON: &str = "referenced owner no longer exists";

/// Owner of the suggestion lifecycle.
///
/// Transitions for a given suggestion id are serialized through a per-id
/// lock; different suggestions proceed fully in parallel. Undo windows
/// live in an explicit registry with cancel-on-supersede semantics — a
/// later action on the same suggestion cancels any outstanding window.
pub struct SuggestionManager<R: Repository> {
    repo: Arc<R>,
    engine: MatchEngine<R>,
    coordinator: MergeCoordinator<R>,
    config: SuggestionConfig,
    undo: Mutex<UndoRegistry>,
    locks: Mutex<HashMap<SuggestionId, Arc<Mutex<()>>>>,
    metrics: Mutex<ResolutionMetrics>,
}

impl<R: Repository> SuggestionManager<R> {
    pub fn new(repo: Arc<R>, engine: MatchEngine<R>, config: SuggestionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coordinator: MergeCoordinator::new(repo.clone()),
            repo,
            engine,
            config,
            undo: Mutex::new(UndoRegistry::new()),
            locks: Mutex::new(HashMap::new()),
            metrics: Mutex::new(ResolutionMetrics::new()),
        })
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    /// Run the matching engine for a stored data item and persist a
    /// pending suggestion for every hit at or above the display
    /// threshold. Pairs that already carry a suggestion (pending or
    /// decided) are skipped.
    pub fn generate_for_item(&self, item: &DataItem) -> Result<Vec<Suggestion>> {
        let source = item.owner.ok_or_else(|| {
            ResolveError::Validation("cannot generate suggestions for an unowned data item".into())
        })?;

        let query = MatchQuery::new()
            .with_include_partial(self.config.include_partial)
            .with_partial_threshold(self.config.partial_threshold)
            .excluding(source.id());

        let matches = if item.kind.is_binary() {
            match &item.content_hash {
                Some(hash) => self.engine.find_matches(hash, item.kind, &query)?,
                None => Vec::new(),
            }
        } else {
            self.engine
                .find_matches(&item.raw_value, item.kind, &query)?
        };

        let mut created = Vec::new();
        for m in matches {
            if m.confidence.value < self.config.min_confidence {
                continue;
            }
            let matched = m.result.owner;
            if self
                .repo
                .find_suggestion_for_pair(source.id(), matched.id())?
                .is_some()
            {
                continue;
            }
            let suggestion = Suggestion::new(
                source,
                matched,
                m.match_type,
                m.result.field_kind,
                m.confidence.value,
                m.confidence.level,
                m.confidence.factors,
            );
            self.repo.put_suggestion(&suggestion)?;
            log::info!(
                "Suggestion {}: {} ~ {} on {} ({}, confidence {:.2})",
                suggestion.id,
                source,
                matched,
                suggestion.matched_field,
                suggestion.match_type,
                suggestion.confidence
            );
            created.push(suggestion);
        }

        if !created.is_empty() {
            self.metrics()?.add_suggestions_created(created.len() as u64);
        }
        Ok(created)
    }

    /// List suggestions. Pending suggestions whose source or match no
    /// longer exists are invalidated here, lazily, and excluded.
    pub fn list(&self, filter: &SuggestionFilter) -> Result<Vec<Suggestion>> {
        let mut out = Vec::new();
        for suggestion in self.repo.list_suggestions(filter)? {
            if suggestion.status == SuggestionStatus::Pending
                && !(self.owner_alive(suggestion.source)? && self.owner_alive(suggestion.matched)?)
            {
                self.invalidate(suggestion)?;
                continue;
            }
            out.push(suggestion);
        }
        Ok(out)
    }

    /// Dismiss a pending suggestion. The reason is mandatory. Opens an
    /// undo window during which the dismissal can be reverted.
    pub fn dismiss(&self, id: SuggestionId, reason: &str) -> Result<Suggestion> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ResolveError::Validation(
                "dismiss reason must not be empty".into(),
            ));
        }

        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ResolveError::Unavailable("suggestion lock poisoned".into()))?;

        let mut suggestion = self.load_pending(id)?;
        suggestion.status = SuggestionStatus::Dismissed;
        suggestion.dismiss_reason = Some(reason.to_string());
        suggestion.touch();
        self.repo.put_suggestion(&suggestion)?;

        self.undo_registry()?.register(
            id,
            UndoAction::RevertDismiss,
            self.config.dismiss_undo_window,
        );
        self.metrics()?.add_suggestions_dismissed(1);
        log::info!("Suggestion {id} dismissed: {reason}");
        Ok(suggestion)
    }

    /// Accept a suggestion as a non-destructive link between the two
    /// owners. No data moves. Opens a shorter undo window that removes
    /// the created relationship if exercised.
    pub fn link(&self, id: SuggestionId) -> Result<Suggestion> {
        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ResolveError::Unavailable("suggestion lock poisoned".into()))?;

        let mut suggestion = self.load_pending(id)?;
        let relationship = Relationship::new(
            suggestion.source.id(),
            suggestion.matched.id(),
            RelationKind::LinkedTo,
            Some(id),
        );
        self.repo.put_relationship(&relationship)?;

        suggestion.status = SuggestionStatus::Linked;
        suggestion.relationship_id = Some(relationship.id);
        suggestion.touch();
        self.repo.put_suggestion(&suggestion)?;

        self.undo_registry()?.register(
            id,
            UndoAction::RevertLink {
                relationship: relationship.id,
            },
            self.config.link_undo_window,
        );
        self.metrics()?.add_suggestions_linked(1);
        log::info!(
            "Suggestion {id} linked: {} -> {}",
            suggestion.source,
            suggestion.matched
        );
        Ok(suggestion)
    }

    /// Accept a suggestion as a merge, the source entity winning.
    /// Irreversible: there is no undo window for merges.
    pub fn merge(&self, id: SuggestionId, reason: &str) -> Result<MergeRecord> {
        let suggestion = self
            .repo
            .get_suggestion(id)?
            .ok_or(ResolveError::SuggestionNotFound(id))?;
        let winner = suggestion.source.as_entity().ok_or_else(|| {
            ResolveError::Validation(
                "merge requires entity owners on both sides; link orphans instead".into(),
            )
        })?;
        self.merge_with_winner(id, winner, reason)
    }

    /// Accept a suggestion as a merge with an explicit winner, which
    /// must be one of the suggestion's two sides.
    pub fn merge_with_winner(
        &self,
        id: SuggestionId,
        winner: EntityId,
        reason: &str,
    ) -> Result<MergeRecord> {
        let reason = reason.trim();
        if reason.chars().count() < self.config.min_merge_reason_len {
            return Err(ResolveError::Validation(format!(
                "merge reason must be at least {} characters",
                self.config.min_merge_reason_len
            )));
        }

        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ResolveError::Unavailable("suggestion lock poisoned".into()))?;

        let mut suggestion = self.load_pending(id)?;
        let source = suggestion.source.as_entity();
        let matched = suggestion.matched.as_entity();
        let (source, matched) = match (source, matched) {
            (Some(s), Some(m)) => (s, m),
            _ => {
                return Err(ResolveError::Validation(
                    "merge requires entity owners on both sides; link orphans instead".into(),
                ))
            }
        };
        let loser = if winner == source {
            matched
        } else if winner == matched {
            source
        } else {
            return Err(ResolveError::Validation(format!(
                "winner {winner} is not part of suggestion {id}"
            )));
        };

        let record = match self.coordinator.merge(winner, loser, reason) {
            Ok(record) => record,
            Err(err) => {
                if matches!(err, ResolveError::Conflict { .. }) {
                    self.metrics()?.add_merge_conflicts(1);
                }
                return Err(err);
            }
        };

        suggestion.status = SuggestionStatus::Merged;
        suggestion.touch();
        self.repo.put_suggestion(&suggestion)?;
        self.undo_registry()?.cancel(id);
        self.metrics()?.add_suggestions_merged(1);
        log::info!("Suggestion {id} merged: {loser} into {winner}");
        Ok(record)
    }

    /// Revert the last transition while its undo window is open.
    /// `dismissed → pending` and `linked → pending` only; merges are
    /// irreversible by design.
    pub fn undo(&self, id: SuggestionId) -> Result<Suggestion> {
        let lock = self.lock_for(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ResolveError::Unavailable("suggestion lock poisoned".into()))?;

        let claim = self.undo_registry()?.claim(id, Instant::now());
        match claim {
            UndoClaim::Active(entry) => {
                let mut suggestion = self
                    .repo
                    .get_suggestion(id)?
                    .ok_or(ResolveError::SuggestionNotFound(id))?;
                match entry.action {
                    UndoAction::RevertDismiss => {
                        suggestion.dismiss_reason = None;
                    }
                    UndoAction::RevertLink { relationship } => {
                        self.repo.delete_relationship(relationship)?;
                        suggestion.relationship_id = None;
                    }
                }
                suggestion.status = SuggestionStatus::Pending;
                suggestion.touch();
                self.repo.put_suggestion(&suggestion)?;
                self.metrics()?.add_undos_applied(1);
                log::info!("Suggestion {id} restored to pending by undo");
                Ok(suggestion)
            }
            UndoClaim::Expired => {
                self.metrics()?.add_undos_expired(1);
                let suggestion = self
                    .repo
                    .get_suggestion(id)?
                    .ok_or(ResolveError::SuggestionNotFound(id))?;
                Err(ResolveError::AlreadyTerminal {
                    id,
                    status: suggestion.status,
                })
            }
            UndoClaim::Missing => {
                let suggestion = self
                    .repo
                    .get_suggestion(id)?
                    .ok_or(ResolveError::SuggestionNotFound(id))?;
                if suggestion.status.is_terminal() {
                    Err(ResolveError::AlreadyTerminal {
                        id,
                        status: suggestion.status,
                    })
                } else {
                    Err(ResolveError::Validation(format!(
                        "suggestion {id} is pending; nothing to undo"
                    )))
                }
            }
        }
    }

    /// Finalize expired undo windows. Not needed for correctness — the
    /// deadline check at claim time is — only for hygiene.
    pub fn sweep_expired(&self) -> Result<usize> {
        let swept = self.undo_registry()?.sweep_expired(Instant::now());
        if !swept.is_empty() {
            self.metrics()?.add_undos_expired(swept.len() as u64);
            log::debug!("Finalized {} expired undo windows", swept.len());
        }
        Ok(swept.len())
    }

    pub fn metrics_snapshot(&self) -> Result<ResolutionMetrics> {
        Ok(self.metrics()?.clone())
    }

    fn load_pending(&self, id: SuggestionId) -> Result<Suggestion> {
        let suggestion = self
            .repo
            .get_suggestion(id)?
            .ok_or(ResolveError::SuggestionNotFound(id))?;
        if suggestion.status.is_terminal() {
            return Err(ResolveError::AlreadyTerminal {
                id,
                status: suggestion.status,
            });
        }
        Ok(suggestion)
    }

    fn owner_alive(&self, owner: OwnerRef) -> Result<bool> {
        match owner {
            OwnerRef::Entity(id) => Ok(self
                .repo
                .get_entity(id)?
                .map(|e| !e.retired)
                .unwrap_or(false)),
            OwnerRef::Orphan(id) => self.repo.orphan_exists(id),
        }
    }

    fn invalidate(&self, mut suggestion: Suggestion) -> Result<()> {
        log::warn!(
            "Invalidating suggestion {}: source or match is gone",
            suggestion.id
        );
        suggestion.status = SuggestionStatus::Dismissed;
        suggestion.dismiss_reason = Some(INVALIDATED_REASON.to_string());
        suggestion.touch();
        self.repo.put_suggestion(&suggestion)?;
        // No undo window: there is nothing valid to restore.
        self.undo_registry()?.cancel(suggestion.id);
        self.metrics()?.add_suggestions_invalidated(1);
        Ok(())
    }

    fn lock_for(&self, id: SuggestionId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ResolveError::Unavailable("lock table poisoned".into()))?;
        Ok(locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn undo_registry(&self) -> Result<std::sync::MutexGuard<'_, UndoRegistry>> {
        self.undo
            .lock()
            .map_err(|_| ResolveError::Unavailable("undo registry lock poisoned".into()))
    }

    fn metrics(&self) -> Result<std::sync::MutexGuard<'_, ResolutionMetrics>> {
        self.metrics
            .lock()
            .map_err(|_| ResolveError::Unavailable("metrics lock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::FieldKind;
    use crate::repository::MemoryRepository;
    use crate::types::Entity;
    use std::time::Duration;

    struct Fixture {
        repo: Arc<MemoryRepository>,
        manager: SuggestionManager<MemoryRepository>,
        a: Entity,
        b: Entity,
    }

    fn fixture_with(config: SuggestionConfig) -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let a = Entity::new("Alpha");
        let b = Entity::new("Beta");
        repo.put_entity(&a).unwrap();
        repo.put_entity(&b).unwrap();
        let engine = MatchEngine::new(repo.clone());
        let manager = SuggestionManager::new(repo.clone(), engine, config).unwrap();
        Fixture { repo, manager, a, b }
    }

    fn fixture() -> Fixture {
        fixture_with(SuggestionConfig::default())
    }

    /// Store the same email on both entities and generate the resulting
    /// exact-string suggestion from A's side.
    fn seeded_suggestion(f: &Fixture) -> Suggestion {
        let theirs = DataItem::new(
            FieldKind::Email,
            "shared@x.com",
            Some(OwnerRef::Entity(f.b.id)),
        );
        f.repo.put_data_item(&theirs).unwrap();
        let ours = DataItem::new(
            FieldKind::Email,
            "Shared@X.com",
            Some(OwnerRef::Entity(f.a.id)),
        );
        f.repo.put_data_item(&ours).unwrap();

        let created = f.manager.generate_for_item(&ours).unwrap();
        assert_eq!(created.len(), 1);
        created.into_iter().next().unwrap()
    }

    #[test]
    fn generation_creates_pending_suggestion_once() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        assert_eq!(suggestion.status, SuggestionStatus::Pending);
        assert_eq!(suggestion.confidence, 0.95);

        // Regenerating for the same item does not duplicate the pair.
        let ours = f
            .repo
            .data_items_for_owner(OwnerRef::Entity(f.a.id))
            .unwrap()
            .remove(0);
        let again = f.manager.generate_for_item(&ours).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn dismiss_requires_a_reason() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        let err = f.manager.dismiss(suggestion.id, "   ").unwrap_err();
        assert!(matches!(err, ResolveError::Validation(_)));
        // Rejected before any side effect.
        let stored = f.repo.get_suggestion(suggestion.id).unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Pending);
    }

    #[test]
    fn dismiss_then_undo_within_window_restores_pending() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        let dismissed = f
            .manager
            .dismiss(suggestion.id, "different person")
            .unwrap();
        assert_eq!(dismissed.status, SuggestionStatus::Dismissed);
        assert_eq!(dismissed.dismiss_reason.as_deref(), Some("different person"));

        let restored = f.manager.undo(suggestion.id).unwrap();
        assert_eq!(restored.status, SuggestionStatus::Pending);
        assert!(restored.dismiss_reason.is_none());
    }

    #[test]
    fn undo_after_window_expiry_is_already_terminal() {
        let f = fixture_with(
            SuggestionConfig::default().with_dismiss_undo_window(Duration::ZERO),
        );
        let suggestion = seeded_suggestion(&f);
        f.manager.dismiss(suggestion.id, "stale lead").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let err = f.manager.undo(suggestion.id).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::AlreadyTerminal {
                status: SuggestionStatus::Dismissed,
                ..
            }
        ));
        assert_eq!(f.manager.metrics_snapshot().unwrap().undos_expired, 1);
    }

    #[test]
    fn link_creates_relationship_and_undo_removes_it() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        let linked = f.manager.link(suggestion.id).unwrap();
        assert_eq!(linked.status, SuggestionStatus::Linked);
        let rel_id = linked.relationship_id.unwrap();
        let rels = f.repo.relationships_for(f.a.id).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].id, rel_id);
        assert_eq!(rels[0].created_by, Some(suggestion.id));

        let restored = f.manager.undo(suggestion.id).unwrap();
        assert_eq!(restored.status, SuggestionStatus::Pending);
        assert!(restored.relationship_id.is_none());
        assert!(f.repo.relationships_for(f.a.id).unwrap().is_empty());
    }

    #[test]
    fn actions_on_terminal_suggestions_are_already_terminal() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        f.manager.dismiss(suggestion.id, "not the same org").unwrap();

        let err = f.manager.link(suggestion.id).unwrap_err();
        assert!(matches!(err, ResolveError::AlreadyTerminal { .. }));
        let err = f
            .manager
            .dismiss(suggestion.id, "second dismissal")
            .unwrap_err();
        assert!(matches!(err, ResolveError::AlreadyTerminal { .. }));
    }

    #[test]
    fn later_action_supersedes_previous_undo_window() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);

        f.manager.dismiss(suggestion.id, "first pass").unwrap();
        f.manager.undo(suggestion.id).unwrap();
        f.manager.link(suggestion.id).unwrap();

        // The live window belongs to the link, not the old dismissal.
        let restored = f.manager.undo(suggestion.id).unwrap();
        assert_eq!(restored.status, SuggestionStatus::Pending);
        assert!(f.repo.relationships_for(f.a.id).unwrap().is_empty());
    }

    #[test]
    fn merge_reason_minimum_length_enforced() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        let err = f.manager.merge(suggestion.id, "dup").unwrap_err();
        assert!(matches!(err, ResolveError::Validation(_)));
        let stored = f.repo.get_suggestion(suggestion.id).unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Pending);
    }

    #[test]
    fn merge_is_terminal_with_no_undo() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        let record = f
            .manager
            .merge(suggestion.id, "confirmed duplicate records")
            .unwrap();
        assert_eq!(record.winner_id, f.a.id);
        assert_eq!(record.loser_id, f.b.id);

        let stored = f.repo.get_suggestion(suggestion.id).unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Merged);
        assert!(f.repo.get_entity(f.b.id).unwrap().unwrap().retired);

        let err = f.manager.undo(suggestion.id).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::AlreadyTerminal {
                status: SuggestionStatus::Merged,
                ..
            }
        ));
    }

    #[test]
    fn merge_with_explicit_winner_flips_direction() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        let record = f
            .manager
            .merge_with_winner(suggestion.id, f.b.id, "b is the canonical record")
            .unwrap();
        assert_eq!(record.winner_id, f.b.id);
        assert_eq!(record.loser_id, f.a.id);
    }

    #[test]
    fn merge_requires_entities_on_both_sides() {
        let f = fixture();
        let orphan = uuid::Uuid::now_v7();
        f.repo.register_orphan(orphan).unwrap();
        let theirs = DataItem::new(
            FieldKind::Email,
            "orphan@x.com",
            Some(OwnerRef::Entity(f.b.id)),
        );
        f.repo.put_data_item(&theirs).unwrap();
        let ours = DataItem::new(
            FieldKind::Email,
            "orphan@x.com",
            Some(OwnerRef::Orphan(orphan)),
        );
        f.repo.put_data_item(&ours).unwrap();

        let created = f.manager.generate_for_item(&ours).unwrap();
        assert_eq!(created.len(), 1);
        let err = f
            .manager
            .merge(created[0].id, "orphan should fold into entity")
            .unwrap_err();
        assert!(matches!(err, ResolveError::Validation(_)));

        // Linking the orphan is the supported path.
        let linked = f.manager.link(created[0].id).unwrap();
        assert_eq!(linked.status, SuggestionStatus::Linked);
    }

    #[test]
    fn pending_suggestion_with_missing_referent_is_invalidated_on_read() {
        let f = fixture();
        let suggestion = seeded_suggestion(&f);
        f.repo.remove_entity(f.b.id).unwrap();

        let listed = f.manager.list(&SuggestionFilter::new()).unwrap();
        assert!(listed.is_empty());

        // Retained for audit, terminal, with the system reason.
        let stored = f.repo.get_suggestion(suggestion.id).unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Dismissed);
        assert_eq!(stored.dismiss_reason.as_deref(), Some(INVALIDATED_REASON));
        assert_eq!(
            f.manager.metrics_snapshot().unwrap().suggestions_invalidated,
            1
        );
    }

    #[test]
    fn sweep_finalizes_expired_windows() {
        let f = fixture_with(
            SuggestionConfig::default().with_dismiss_undo_window(Duration::ZERO),
        );
        let suggestion = seeded_suggestion(&f);
        f.manager.dismiss(suggestion.id, "cold trail").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(f.manager.sweep_expired().unwrap(), 1);
        assert_eq!(f.manager.sweep_expired().unwrap(), 0);
        let err = f.manager.undo(suggestion.id).unwrap_err();
        assert!(matches!(err, ResolveError::AlreadyTerminal { .. }));
    }
}
