//! Execution of accepted merge decisions.
//!
//! A merge consolidates the loser entity's data and relationships into
//! the winner, retires the loser behind a permanent id redirect, and
//! leaves an append-only audit record. It is protected by optimistic
//! version tokens: the versions captured at request time are re-checked
//! inside the repository's unit of work, and any mismatch aborts with
//! `Conflict` and zero mutations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ResolveError, Result};
use crate::repository::{MergePlan, Repository};
use crate::types::{ConflictResolution, Entity, EntityId, MergeRecord, OwnerRef};

pub struct MergeCoordinator<R: Repository> {
    repo: Arc<R>,
}

impl<R: Repository> MergeCoordinator<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Merge loser into winner, capturing version tokens now. Irreversible.
    pub fn merge(&self, winner: EntityId, loser: EntityId, reason: &str) -> Result<MergeRecord> {
        let (winner_entity, loser_entity) = self.load_pair(winner, loser)?;
        self.merge_with_versions(
            winner,
            loser,
            winner_entity.version,
            loser_entity.version,
            reason,
        )
    }

    /// Merge with explicitly captured version tokens, e.g. from an
    /// earlier read shown to the reviewing user.
    pub fn merge_with_versions(
        &self,
        winner: EntityId,
        loser: EntityId,
        expected_winner_version: u64,
        expected_loser_version: u64,
        reason: &str,
    ) -> Result<MergeRecord> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ResolveError::Validation(
                "merge reason must not be empty".into(),
            ));
        }
        self.load_pair(winner, loser)?;

        let winner_items = self.repo.data_items_for_owner(OwnerRef::Entity(winner))?;
        let mut loser_items = self.repo.data_items_for_owner(OwnerRef::Entity(loser))?;
        // Stable processing order so conflict records are reproducible.
        loser_items.sort_by_key(|i| i.id);

        let mut winner_keys: HashMap<(_, String), _> = HashMap::new();
        for item in &winner_items {
            if let Some(key) = item.match_key() {
                winner_keys.entry((item.kind, key)).or_insert(item.id);
            }
        }

        let mut transfers = Vec::new();
        let mut drops = Vec::new();
        let mut transferred_per_kind: HashMap<_, u64> = HashMap::new();
        for item in &loser_items {
            match item.match_key() {
                Some(key) => match winner_keys.get(&(item.kind, key.clone())) {
                    Some(&kept) => {
                        // The winner already owns an equivalent item; the
                        // loser's copy is dropped, never silently.
                        drops.push(ConflictResolution {
                            kind: item.kind,
                            normalized_value: key,
                            kept,
                            dropped: item.id,
                        });
                    }
                    None => {
                        transfers.push(item.id);
                        *transferred_per_kind.entry(item.kind).or_insert(0) += 1;
                    }
                },
                None => {
                    transfers.push(item.id);
                    *transferred_per_kind.entry(item.kind).or_insert(0) += 1;
                }
            }
        }

        let record = MergeRecord::new(winner, loser, reason, transferred_per_kind, drops.clone());
        let plan = MergePlan {
            winner,
            loser,
            expected_winner_version,
            expected_loser_version,
            transfers,
            drops,
            record: record.clone(),
        };

        self.repo.apply_merge(&plan)?;

        log::info!(
            "Merged entity {} into {}: {} items transferred, {} conflicts resolved",
            loser,
            winner,
            plan.transfers.len(),
            record.conflicts_resolved.len()
        );

        Ok(record)
    }

    fn load_pair(&self, winner: EntityId, loser: EntityId) -> Result<(Entity, Entity)> {
        if winner == loser {
            return Err(ResolveError::Validation(
                "an entity cannot be merged with itself".into(),
            ));
        }
        let winner_entity = self
            .repo
            .get_entity(winner)?
            .ok_or(ResolveError::EntityNotFound(winner))?;
        let loser_entity = self
            .repo
            .get_entity(loser)?
            .ok_or(ResolveError::EntityNotFound(loser))?;
        if winner_entity.retired {
            return Err(ResolveError::Validation(format!(
                "merge winner {winner} is retired"
            )));
        }
        if loser_entity.retired {
            return Err(ResolveError::Validation(format!(
                "merge loser {loser} is retired"
            )));
        }
        Ok((winner_entity, loser_entity))
    }
}
