use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{ResolveError, Result};
use crate::kinds::FieldKind;
use crate::repository::filters::{FuzzyPrefilter, SuggestionFilter};
use crate::repository::traits::{MergePlan, Repository};
use crate::types::{
    DataItem, DataItemId, Entity, EntityId, MatchResult, MergeRecord, OrphanId, OwnerRef,
    Relationship, RelationshipId, Suggestion, SuggestionId, pair_key,
};

#[derive(Debug, Default)]
struct State {
    entities: HashMap<EntityId, Entity>,
    orphans: HashSet<OrphanId>,
    items: HashMap<DataItemId, DataItem>,
    relationships: HashMap<RelationshipId, Relationship>,
    suggestions: HashMap<SuggestionId, Suggestion>,
    merge_records: Vec<MergeRecord>,
    /// Permanent id redirects written by merges.
    redirects: HashMap<EntityId, EntityId>,
}

impl State {
    fn owner_alive(&self, owner: OwnerRef) -> bool {
        match owner {
            OwnerRef::Entity(id) => self
                .entities
                .get(&id)
                .map(|e| !e.retired)
                .unwrap_or(false),
            OwnerRef::Orphan(id) => self.orphans.contains(&id),
        }
    }

    fn match_result_for(&self, item: &DataItem) -> Option<MatchResult> {
        let owner = item.owner?;
        if !self.owner_alive(owner) {
            return None;
        }
        Some(MatchResult {
            owner,
            field_kind: item.kind,
            field_path: None,
            data_item_id: Some(item.id),
            updated_at: item.updated_at,
        })
    }

    fn repoint(&mut self, from: Uuid, to: Uuid) -> u64 {
        let ids: Vec<RelationshipId> = self
            .relationships
            .values()
            .filter(|r| r.from == from || r.to == from)
            .map(|r| r.id)
            .collect();
        let mut survived = 0;
        for id in ids {
            let rel = self.relationships.get_mut(&id).expect("id from same map");
            if rel.from == from {
                rel.from = to;
            }
            if rel.to == from {
                rel.to = to;
            }
            if rel.from == rel.to {
                self.relationships.remove(&id);
            } else {
                survived += 1;
            }
        }
        survived
    }
}

/// In-memory reference repository. Single `RwLock` over the whole state:
/// `apply_merge` validates everything before mutating, so any failure
/// leaves the pre-merge state fully intact.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| ResolveError::Unavailable("repository lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| ResolveError::Unavailable("repository lock poisoned".into()))
    }

    /// Hard-remove an entity, simulating a concurrent delete by the
    /// wider system. Exposed for lifecycle tests.
    pub fn remove_entity(&self, id: EntityId) -> Result<()> {
        self.write()?.entities.remove(&id);
        Ok(())
    }

    /// Hard-remove an orphan, simulating a concurrent delete.
    pub fn remove_orphan(&self, id: OrphanId) -> Result<()> {
        self.write()?.orphans.remove(&id);
        Ok(())
    }
}

impl Repository for MemoryRepository {
    fn put_entity(&self, entity: &Entity) -> Result<()> {
        self.write()?.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        Ok(self.read()?.entities.get(&id).cloned())
    }

    fn resolve_entity_id(&self, id: EntityId) -> Result<EntityId> {
        let state = self.read()?;
        let mut current = id;
        // Redirect chains are short; the bound guards against a corrupt
        // cycle.
        for _ in 0..64 {
            match state.redirects.get(&current) {
                Some(next) => current = *next,
                None => return Ok(current),
            }
        }
        Err(ResolveError::Unavailable(format!(
            "redirect cycle detected at entity {id}"
        )))
    }

    fn retire_entity(&self, id: EntityId, merged_into: EntityId) -> Result<()> {
        let mut state = self.write()?;
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or(ResolveError::EntityNotFound(id))?;
        entity.retired = true;
        entity.merged_into = Some(merged_into);
        entity.touch();
        state.redirects.insert(id, merged_into);
        Ok(())
    }

    fn register_orphan(&self, id: OrphanId) -> Result<()> {
        self.write()?.orphans.insert(id);
        Ok(())
    }

    fn orphan_exists(&self, id: OrphanId) -> Result<bool> {
        Ok(self.read()?.orphans.contains(&id))
    }

    fn put_data_item(&self, item: &DataItem) -> Result<()> {
        self.write()?.items.insert(item.id, item.clone());
        Ok(())
    }

    fn get_data_item(&self, id: DataItemId) -> Result<Option<DataItem>> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    fn data_items_for_owner(&self, owner: OwnerRef) -> Result<Vec<DataItem>> {
        let state = self.read()?;
        let mut items: Vec<DataItem> = state
            .items
            .values()
            .filter(|i| i.owner == Some(owner))
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    fn transfer_data_item(&self, item_id: DataItemId, to: OwnerRef) -> Result<()> {
        let mut state = self.write()?;
        let item = state
            .items
            .get_mut(&item_id)
            .ok_or(ResolveError::DataItemNotFound(item_id))?;
        item.owner = Some(to);
        item.touch();
        Ok(())
    }

    fn find_by_normalized_value(
        &self,
        kind: FieldKind,
        value: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<MatchResult>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|i| i.kind == kind && i.normalized_value.as_deref() == Some(value))
            .filter(|i| match (exclude, i.owner) {
                (Some(ex), Some(owner)) => owner.id() != ex,
                _ => true,
            })
            .filter_map(|i| state.match_result_for(i))
            .collect())
    }

    fn find_by_content_hash(
        &self,
        hash: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<MatchResult>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|i| i.content_hash.as_deref() == Some(hash))
            .filter(|i| match (exclude, i.owner) {
                (Some(ex), Some(owner)) => owner.id() != ex,
                _ => true,
            })
            .filter_map(|i| state.match_result_for(i))
            .collect())
    }

    fn find_candidates_for_fuzzy(
        &self,
        kind: FieldKind,
        prefilter: &FuzzyPrefilter,
    ) -> Result<Vec<DataItem>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|i| i.kind == kind)
            .filter(|i| {
                i.normalized_value
                    .as_deref()
                    .map(|v| prefilter.accepts(v))
                    .unwrap_or(false)
            })
            .filter(|i| i.owner.map(|o| state.owner_alive(o)).unwrap_or(false))
            .cloned()
            .collect())
    }

    fn put_relationship(&self, relationship: &Relationship) -> Result<()> {
        relationship
            .validate()
            .map_err(ResolveError::Validation)?;
        self.write()?
            .relationships
            .insert(relationship.id, relationship.clone());
        Ok(())
    }

    fn delete_relationship(&self, id: RelationshipId) -> Result<()> {
        let mut state = self.write()?;
        state
            .relationships
            .remove(&id)
            .ok_or(ResolveError::RelationshipNotFound(id))?;
        Ok(())
    }

    fn relationships_for(&self, owner_id: Uuid) -> Result<Vec<Relationship>> {
        let state = self.read()?;
        let mut rels: Vec<Relationship> = state
            .relationships
            .values()
            .filter(|r| r.from == owner_id || r.to == owner_id)
            .cloned()
            .collect();
        rels.sort_by_key(|r| r.id);
        Ok(rels)
    }

    fn repoint_relationships(&self, from: Uuid, to: Uuid) -> Result<u64> {
        Ok(self.write()?.repoint(from, to))
    }

    fn put_suggestion(&self, suggestion: &Suggestion) -> Result<()> {
        self.write()?
            .suggestions
            .insert(suggestion.id, suggestion.clone());
        Ok(())
    }

    fn get_suggestion(&self, id: SuggestionId) -> Result<Option<Suggestion>> {
        Ok(self.read()?.suggestions.get(&id).cloned())
    }

    fn list_suggestions(&self, filter: &SuggestionFilter) -> Result<Vec<Suggestion>> {
        let state = self.read()?;
        let mut out: Vec<Suggestion> = state
            .suggestions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn find_suggestion_for_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Suggestion>> {
        let key = pair_key(a, b);
        let state = self.read()?;
        Ok(state
            .suggestions
            .values()
            .filter(|s| s.pair_key() == key)
            .max_by(|x, y| {
                x.updated_at
                    .cmp(&y.updated_at)
                    .then_with(|| x.id.cmp(&y.id))
            })
            .cloned())
    }

    fn apply_merge(&self, plan: &MergePlan) -> Result<()> {
        let mut state = self.write()?;

        // Validate everything before touching state, so a failed merge is
        // a strict no-op.
        let winner = state
            .entities
            .get(&plan.winner)
            .ok_or(ResolveError::EntityNotFound(plan.winner))?;
        let loser = state
            .entities
            .get(&plan.loser)
            .ok_or(ResolveError::EntityNotFound(plan.loser))?;
        if winner.retired {
            return Err(ResolveError::Validation(format!(
                "merge winner {} is retired",
                plan.winner
            )));
        }
        if loser.retired {
            return Err(ResolveError::Validation(format!(
                "merge loser {} is retired",
                plan.loser
            )));
        }
        if winner.version != plan.expected_winner_version {
            return Err(ResolveError::Conflict {
                entity: plan.winner,
                expected: plan.expected_winner_version,
                actual: winner.version,
            });
        }
        if loser.version != plan.expected_loser_version {
            return Err(ResolveError::Conflict {
                entity: plan.loser,
                expected: plan.expected_loser_version,
                actual: loser.version,
            });
        }
        let loser_owner = Some(OwnerRef::Entity(plan.loser));
        for item_id in plan
            .transfers
            .iter()
            .chain(plan.drops.iter().map(|c| &c.dropped))
        {
            match state.items.get(item_id) {
                Some(item) if item.owner == loser_owner => {}
                _ => {
                    return Err(ResolveError::Validation(format!(
                        "merge plan is stale: data item {item_id} is not owned by the loser"
                    )))
                }
            }
        }

        // All checks passed; apply every step.
        for conflict in &plan.drops {
            state.items.remove(&conflict.dropped);
        }
        for item_id in &plan.transfers {
            let item = state.items.get_mut(item_id).expect("validated above");
            item.owner = Some(OwnerRef::Entity(plan.winner));
            item.touch();
        }
        state.repoint(plan.loser, plan.winner);
        {
            let loser = state.entities.get_mut(&plan.loser).expect("validated above");
            loser.retired = true;
            loser.merged_into = Some(plan.winner);
            loser.touch();
        }
        state.redirects.insert(plan.loser, plan.winner);
        {
            let winner = state
                .entities
                .get_mut(&plan.winner)
                .expect("validated above");
            winner.version += 1;
            winner.touch();
        }
        state.merge_records.push(plan.record.clone());
        Ok(())
    }

    fn list_merge_records(&self) -> Result<Vec<MergeRecord>> {
        Ok(self.read()?.merge_records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationKind;

    #[test]
    fn normalized_value_lookup_excludes_owner() {
        let repo = MemoryRepository::new();
        let a = Entity::new("A");
        let b = Entity::new("B");
        repo.put_entity(&a).unwrap();
        repo.put_entity(&b).unwrap();
        repo.put_data_item(&DataItem::new(
            FieldKind::Email,
            "x@y.com",
            Some(OwnerRef::Entity(a.id)),
        ))
        .unwrap();
        repo.put_data_item(&DataItem::new(
            FieldKind::Email,
            "x@y.com",
            Some(OwnerRef::Entity(b.id)),
        ))
        .unwrap();

        let hits = repo
            .find_by_normalized_value(FieldKind::Email, "x@y.com", Some(a.id))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].owner, OwnerRef::Entity(b.id));
    }

    #[test]
    fn retired_owner_is_not_a_candidate() {
        let repo = MemoryRepository::new();
        let a = Entity::new("A");
        let b = Entity::new("B");
        repo.put_entity(&a).unwrap();
        repo.put_entity(&b).unwrap();
        repo.put_data_item(&DataItem::new(
            FieldKind::Email,
            "x@y.com",
            Some(OwnerRef::Entity(a.id)),
        ))
        .unwrap();
        repo.retire_entity(a.id, b.id).unwrap();

        let hits = repo
            .find_by_normalized_value(FieldKind::Email, "x@y.com", None)
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(repo.resolve_entity_id(a.id).unwrap(), b.id);
    }

    #[test]
    fn repoint_drops_self_edges() {
        let repo = MemoryRepository::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let c = Uuid::now_v7();
        repo.put_relationship(&Relationship::new(a, b, RelationKind::LinkedTo, None))
            .unwrap();
        repo.put_relationship(&Relationship::new(b, c, RelationKind::AssociatedWith, None))
            .unwrap();

        // b collapses into a: the a<->b edge becomes a self-edge and dies,
        // the b->c edge survives as a->c.
        let survived = repo.repoint_relationships(b, a).unwrap();
        assert_eq!(survived, 1);
        let rels = repo.relationships_for(a).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].from, a);
        assert_eq!(rels[0].to, c);
    }

    #[test]
    fn transfer_repoints_ownership() {
        let repo = MemoryRepository::new();
        let entity = Entity::new("Target");
        repo.put_entity(&entity).unwrap();
        let orphan = Uuid::now_v7();
        repo.register_orphan(orphan).unwrap();

        let item = DataItem::new(
            FieldKind::Username,
            "ghostwriter",
            Some(OwnerRef::Orphan(orphan)),
        );
        repo.put_data_item(&item).unwrap();
        assert!(repo.orphan_exists(orphan).unwrap());

        repo.transfer_data_item(item.id, OwnerRef::Entity(entity.id))
            .unwrap();
        let owned = repo
            .data_items_for_owner(OwnerRef::Entity(entity.id))
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, item.id);
        assert!(repo
            .data_items_for_owner(OwnerRef::Orphan(orphan))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn stale_version_conflicts_without_mutation() {
        let repo = MemoryRepository::new();
        let winner = Entity::new("winner");
        let loser = Entity::new("loser");
        repo.put_entity(&winner).unwrap();
        repo.put_entity(&loser).unwrap();
        let item = DataItem::new(
            FieldKind::Email,
            "x@y.com",
            Some(OwnerRef::Entity(loser.id)),
        );
        repo.put_data_item(&item).unwrap();

        let record = MergeRecord::new(winner.id, loser.id, "stale", HashMap::new(), vec![]);
        let plan = MergePlan {
            winner: winner.id,
            loser: loser.id,
            expected_winner_version: 7, // stale
            expected_loser_version: 0,
            transfers: vec![item.id],
            drops: vec![],
            record,
        };

        let err = repo.apply_merge(&plan).unwrap_err();
        assert!(matches!(err, ResolveError::Conflict { .. }));
        // Nothing moved.
        let stored = repo.get_data_item(item.id).unwrap().unwrap();
        assert_eq!(stored.owner, Some(OwnerRef::Entity(loser.id)));
        assert!(!repo.get_entity(loser.id).unwrap().unwrap().retired);
        assert!(repo.list_merge_records().unwrap().is_empty());
    }
}
