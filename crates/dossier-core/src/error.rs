use thiserror::Error;
use uuid::Uuid;

use crate::types::SuggestionStatus;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Rejected before any side effect: empty dismiss reason, merge reason
    /// too short, invalid configuration, orphan where an entity is required.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),

    #[error("Orphan not found: {0}")]
    OrphanNotFound(Uuid),

    #[error("Suggestion not found: {0}")]
    SuggestionNotFound(Uuid),

    #[error("Data item not found: {0}")]
    DataItemNotFound(Uuid),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(Uuid),

    /// Optimistic-concurrency failure: the entity changed between the
    /// version capture and the transactional write. The caller must
    /// re-fetch and retry; nothing was mutated.
    #[error("Version conflict on entity {entity}: expected {expected}, found {actual}")]
    Conflict {
        entity: Uuid,
        expected: u64,
        actual: u64,
    },

    /// Repository timeout or connection failure. Retryable with backoff.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// The suggestion already left the pending state. Distinguishes
    /// "already done" from failure.
    #[error("Suggestion {id} is already {status}")]
    AlreadyTerminal { id: Uuid, status: SuggestionStatus },
}

impl ResolveError {
    /// Whether the caller may retry the operation (after a re-fetch for
    /// `Conflict`, with backoff for `Unavailable`).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::Conflict { .. } | ResolveError::Unavailable(_)
        )
    }
}
