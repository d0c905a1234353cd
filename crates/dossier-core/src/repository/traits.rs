use uuid::Uuid;

use crate::error::Result;
use crate::kinds::FieldKind;
use crate::repository::filters::{FuzzyPrefilter, SuggestionFilter};
use crate::types::{
    ConflictResolution, DataItem, DataItemId, Entity, EntityId, MatchResult, MergeRecord,
    OrphanId, OwnerRef, Relationship, RelationshipId, Suggestion, SuggestionId,
};

/// Everything a completed merge mutates, applied as one scoped unit of
/// work. The implementation must re-check both version tokens against the
/// expectations and either apply every step or none: a `Conflict` (or any
/// validation failure) leaves pre-merge state fully intact.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub winner: EntityId,
    pub loser: EntityId,
    pub expected_winner_version: u64,
    pub expected_loser_version: u64,
    /// Loser items to re-point at the winner.
    pub transfers: Vec<DataItemId>,
    /// Loser items dropped because the winner already owns an equivalent.
    pub drops: Vec<ConflictResolution>,
    /// Audit record, persisted within the same unit of work.
    pub record: MergeRecord,
}

/// Abstraction over the graph-storage collaborator.
///
/// Implementations own the transactional boundary and the indexes on
/// normalized values and content hashes. Calls are expected to carry a
/// bounded timeout and surface it as [`ResolveError::Unavailable`]
/// without leaving partial state.
///
/// [`ResolveError::Unavailable`]: crate::error::ResolveError::Unavailable
pub trait Repository: Send + Sync {
    // === Entities ===

    /// Store an entity (insert or update).
    fn put_entity(&self, entity: &Entity) -> Result<()>;

    /// Retrieve an entity by id, tombstones included.
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>>;

    /// Follow merge redirects to the surviving entity id. An id that was
    /// never merged resolves to itself.
    fn resolve_entity_id(&self, id: EntityId) -> Result<EntityId>;

    /// Tombstone an entity and redirect its id to `merged_into`.
    fn retire_entity(&self, id: EntityId, merged_into: EntityId) -> Result<()>;

    // === Orphans ===

    /// Register an identifier cluster not yet linked to any entity.
    fn register_orphan(&self, id: OrphanId) -> Result<()>;

    fn orphan_exists(&self, id: OrphanId) -> Result<bool>;

    // === Data items ===

    /// Store a data item (insert or update).
    fn put_data_item(&self, item: &DataItem) -> Result<()>;

    fn get_data_item(&self, id: DataItemId) -> Result<Option<DataItem>>;

    fn data_items_for_owner(&self, owner: OwnerRef) -> Result<Vec<DataItem>>;

    /// Re-point a data item's ownership.
    fn transfer_data_item(&self, item_id: DataItemId, to: OwnerRef) -> Result<()>;

    // === Match queries ===

    /// Exact lookup on the normalized-value index. `exclude` drops
    /// candidates owned by that id (self-match suppression).
    fn find_by_normalized_value(
        &self,
        kind: FieldKind,
        value: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<MatchResult>>;

    /// Exact lookup on the content-hash index.
    fn find_by_content_hash(&self, hash: &str, exclude: Option<Uuid>)
        -> Result<Vec<MatchResult>>;

    /// Same-kind candidates passing a cheap pre-filter, for fuzzy
    /// scoring by the caller.
    fn find_candidates_for_fuzzy(
        &self,
        kind: FieldKind,
        prefilter: &FuzzyPrefilter,
    ) -> Result<Vec<DataItem>>;

    // === Relationships ===

    fn put_relationship(&self, relationship: &Relationship) -> Result<()>;

    fn delete_relationship(&self, id: RelationshipId) -> Result<()>;

    /// All relationships incident on an owner id.
    fn relationships_for(&self, owner_id: Uuid) -> Result<Vec<Relationship>>;

    /// Re-point every relationship incident on `from` to `to`, dropping
    /// would-be self-edges. Returns the number of surviving repointed
    /// edges.
    fn repoint_relationships(&self, from: Uuid, to: Uuid) -> Result<u64>;

    // === Suggestions ===

    fn put_suggestion(&self, suggestion: &Suggestion) -> Result<()>;

    fn get_suggestion(&self, id: SuggestionId) -> Result<Option<Suggestion>>;

    fn list_suggestions(&self, filter: &SuggestionFilter) -> Result<Vec<Suggestion>>;

    /// The most recently updated suggestion for an unordered owner pair,
    /// any status.
    fn find_suggestion_for_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Suggestion>>;

    // === Merge unit of work ===

    /// Apply a merge plan atomically: version re-check, conflict drops,
    /// transfers, relationship repointing, loser retirement, winner
    /// version bump, and audit-record append.
    fn apply_merge(&self, plan: &MergePlan) -> Result<()>;

    /// The append-only merge audit log.
    fn list_merge_records(&self) -> Result<Vec<MergeRecord>>;
}
