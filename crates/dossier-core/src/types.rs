use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::kinds::FieldKind;
use crate::normalize::{self, NormalizerConfig};

/// Type alias for entity identifiers
pub type EntityId = Uuid;

/// Type alias for orphan identifiers
pub type OrphanId = Uuid;

/// Type alias for data-item identifiers
pub type DataItemId = Uuid;

/// Type alias for suggestion identifiers
pub type SuggestionId = Uuid;

/// Type alias for relationship identifiers
pub type RelationshipId = Uuid;

/// Type alias for merge-record identifiers
pub type MergeRecordId = Uuid;

/// An intelligence entity (person, organization) in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Unique identifier. UUIDv7 for time-sortability.
    pub id: EntityId,

    /// Display name.
    pub name: String,

    /// Optimistic-concurrency token. Returned with every read, required
    /// by every mutating call, bumped by each merge.
    pub version: u64,

    /// Soft delete. Retired entities are never physically removed, only
    /// tombstoned. Allows audit and permanent id redirection.
    pub retired: bool,

    /// Where lookups of this id are redirected after a merge.
    pub merged_into: Option<EntityId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Entity {
            id: Uuid::now_v7(),
            name: name.into(),
            version: 0,
            retired: false,
            merged_into: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The owner of a data item: a full entity or a not-yet-linked orphan.
///
/// A data item has exactly one or zero owners; the variant encodes the
/// "entity XOR orphan" rule so an item can never carry both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    Entity(EntityId),
    Orphan(OrphanId),
}

impl OwnerRef {
    pub fn id(self) -> Uuid {
        match self {
            OwnerRef::Entity(id) => id,
            OwnerRef::Orphan(id) => id,
        }
    }

    pub fn is_entity(self) -> bool {
        matches!(self, OwnerRef::Entity(_))
    }

    pub fn as_entity(self) -> Option<EntityId> {
        match self {
            OwnerRef::Entity(id) => Some(id),
            OwnerRef::Orphan(_) => None,
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerRef::Entity(id) => write!(f, "entity:{id}"),
            OwnerRef::Orphan(id) => write!(f, "orphan:{id}"),
        }
    }
}

/// An atomic piece of data: an email, phone number, address, file...
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataItem {
    /// Unique identifier. UUIDv7. Immutable.
    pub id: DataItemId,

    pub kind: FieldKind,

    /// The value exactly as entered.
    pub raw_value: String,

    /// Canonical comparable form. Always a pure function of
    /// `(kind, raw_value)`, recomputed on every write. `None` for binary
    /// kinds.
    pub normalized_value: Option<String>,

    /// SHA-256 of the content, hex-encoded. Binary kinds only.
    pub content_hash: Option<String>,

    /// Exactly one or zero owners.
    pub owner: Option<OwnerRef>,

    /// Arbitrary key-value metadata.
    pub metadata: HashMap<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataItem {
    /// Create a string-kind item, normalizing with the default policy.
    pub fn new(kind: FieldKind, raw_value: impl Into<String>, owner: Option<OwnerRef>) -> Self {
        Self::with_config(kind, raw_value, owner, &NormalizerConfig::default())
    }

    /// Create a string-kind item under an explicit normalizer policy.
    pub fn with_config(
        kind: FieldKind,
        raw_value: impl Into<String>,
        owner: Option<OwnerRef>,
        config: &NormalizerConfig,
    ) -> Self {
        let raw_value = raw_value.into();
        let normalized_value = normalize::normalize(kind, &raw_value, config).map(|n| n.value);
        let now = Utc::now();
        DataItem {
            id: Uuid::now_v7(),
            kind,
            raw_value,
            normalized_value,
            content_hash: None,
            owner,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a binary item. The label is kept as the raw value for
    /// display; identity is the content hash.
    pub fn binary(label: impl Into<String>, bytes: &[u8], owner: Option<OwnerRef>) -> Self {
        let now = Utc::now();
        DataItem {
            id: Uuid::now_v7(),
            kind: FieldKind::File,
            raw_value: label.into(),
            normalized_value: None,
            content_hash: Some(normalize::content_hash(bytes)),
            owner,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the raw value, recomputing the normalized form.
    pub fn set_raw_value(&mut self, raw_value: impl Into<String>, config: &NormalizerConfig) {
        self.raw_value = raw_value.into();
        self.normalized_value =
            normalize::normalize(self.kind, &self.raw_value, config).map(|n| n.value);
        self.updated_at = Utc::now();
    }

    /// The key two items are considered duplicates under during a merge:
    /// the normalized value for string kinds, the content hash for binary
    /// kinds.
    pub fn match_key(&self) -> Option<String> {
        self.normalized_value
            .clone()
            .or_else(|| self.content_hash.clone())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// How a candidate was matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    HashMatch,
    ExactString,
    FuzzyMatch,
}

impl MatchType {
    /// Tie-break rank: hash_match > exact_string > fuzzy_match.
    pub fn specificity(self) -> u8 {
        match self {
            MatchType::HashMatch => 3,
            MatchType::ExactString => 2,
            MatchType::FuzzyMatch => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::HashMatch => "hash_match",
            MatchType::ExactString => "exact_string",
            MatchType::FuzzyMatch => "fuzzy_match",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate hit returned by the repository for a query. Ephemeral:
/// produced per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub owner: OwnerRef,
    pub field_kind: FieldKind,
    /// Path within a structured field, when the store indexes one.
    pub field_path: Option<String>,
    pub data_item_id: Option<DataItemId>,
    /// Last update of the matched item. Tie-break input: fresher data
    /// sorts first among equal-confidence candidates.
    pub updated_at: DateTime<Utc>,
}

/// One weighted contribution to a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceFactor {
    pub name: String,
    pub weight: f64,
    pub score: f64,
}

impl ConfidenceFactor {
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        ConfidenceFactor {
            name: name.into(),
            weight,
            score,
        }
    }
}

/// Discrete bucket derived from a continuous confidence score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a suggestion. Terminal states are retained for
/// audit, never hard-deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Dismissed,
    Linked,
    Merged,
}

impl SuggestionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Dismissed => "dismissed",
            SuggestionStatus::Linked => "linked",
            SuggestionStatus::Merged => "merged",
        }
    }
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proposed link between a source owner and a matched candidate,
/// pending human decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub source: OwnerRef,
    pub matched: OwnerRef,
    pub match_type: MatchType,
    pub matched_field: FieldKind,
    /// In [0, 1]. Never below 0.5 for a surfaced suggestion.
    pub confidence: f64,
    pub level: ConfidenceLevel,
    /// Ordered contributions; weights sum to 1.0.
    pub factors: Vec<ConfidenceFactor>,
    pub status: SuggestionStatus,
    /// Required when status is `Dismissed`.
    pub dismiss_reason: Option<String>,
    /// The relationship created by `link`, while status is `Linked`.
    pub relationship_id: Option<RelationshipId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Suggestion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: OwnerRef,
        matched: OwnerRef,
        match_type: MatchType,
        matched_field: FieldKind,
        confidence: f64,
        level: ConfidenceLevel,
        factors: Vec<ConfidenceFactor>,
    ) -> Self {
        let now = Utc::now();
        Suggestion {
            id: Uuid::now_v7(),
            source,
            matched,
            match_type,
            matched_field,
            confidence: confidence.clamp(0.0, 1.0),
            level,
            factors,
            status: SuggestionStatus::Pending,
            dismiss_reason: None,
            relationship_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Order-insensitive key for the (source, matched) pair.
    pub fn pair_key(&self) -> (Uuid, Uuid) {
        pair_key(self.source.id(), self.matched.id())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Order-insensitive pair key for suggestion de-duplication.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// What a relationship between two owners means.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Non-destructive association created by accepting a link
    /// suggestion. Neither side's data moves.
    LinkedTo,
    /// Generic association created outside the resolution workflow.
    AssociatedWith,
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::LinkedTo => write!(f, "linked_to"),
            RelationKind::AssociatedWith => write!(f, "associated_with"),
        }
    }
}

/// An edge between two owners in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub from: Uuid,
    pub to: Uuid,
    pub kind: RelationKind,
    /// The suggestion whose acceptance created this edge, if any.
    pub created_by: Option<SuggestionId>,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(from: Uuid, to: Uuid, kind: RelationKind, created_by: Option<SuggestionId>) -> Self {
        Relationship {
            id: Uuid::now_v7(),
            from,
            to,
            kind,
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.from == self.to {
            return Err("Self-relationships are not allowed".to_string());
        }
        Ok(())
    }
}

/// A field-level decision made while merging: the winner already owned an
/// equivalent item, so the loser's copy was dropped rather than
/// transferred.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictResolution {
    pub kind: FieldKind,
    pub normalized_value: String,
    pub kept: DataItemId,
    pub dropped: DataItemId,
}

/// Append-only audit artifact produced once per completed merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeRecord {
    pub id: MergeRecordId,
    pub winner_id: EntityId,
    pub loser_id: EntityId,
    pub reason: String,
    /// Items transferred to the winner, counted per kind.
    pub data_transferred: HashMap<FieldKind, u64>,
    pub conflicts_resolved: Vec<ConflictResolution>,
    pub performed_at: DateTime<Utc>,
}

impl MergeRecord {
    pub fn new(
        winner_id: EntityId,
        loser_id: EntityId,
        reason: impl Into<String>,
        data_transferred: HashMap<FieldKind, u64>,
        conflicts_resolved: Vec<ConflictResolution>,
    ) -> Self {
        MergeRecord {
            id: Uuid::now_v7(),
            winner_id,
            loser_id,
            reason: reason.into(),
            data_transferred,
            conflicts_resolved,
            performed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_item_normalizes_on_construction() {
        let item = DataItem::new(FieldKind::Email, "Alice@Example.COM", None);
        assert_eq!(item.normalized_value.as_deref(), Some("alice@example.com"));
        assert!(item.content_hash.is_none());
    }

    #[test]
    fn data_item_renormalizes_on_write() {
        let mut item = DataItem::new(FieldKind::Email, "a@b.com", None);
        item.set_raw_value("C@D.com", &NormalizerConfig::default());
        assert_eq!(item.normalized_value.as_deref(), Some("c@d.com"));
    }

    #[test]
    fn binary_item_hashes_content() {
        let item = DataItem::binary("report.pdf", b"content", None);
        assert!(item.normalized_value.is_none());
        assert_eq!(item.content_hash.as_deref().map(str::len), Some(64));
        assert_eq!(item.match_key(), item.content_hash);
    }

    #[test]
    fn pair_key_is_order_insensitive() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn self_relationship_rejected() {
        let id = Uuid::now_v7();
        let rel = Relationship::new(id, id, RelationKind::LinkedTo, None);
        assert!(rel.validate().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SuggestionStatus::Pending.is_terminal());
        assert!(SuggestionStatus::Dismissed.is_terminal());
        assert!(SuggestionStatus::Linked.is_terminal());
        assert!(SuggestionStatus::Merged.is_terminal());
    }
}
