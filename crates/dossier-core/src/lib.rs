pub mod api;
pub mod confidence;
pub mod error;
pub mod kinds;
pub mod matching;
pub mod merge;
pub mod normalize;
pub mod repository;
pub mod similarity;
pub mod suggestion;
pub mod types;

pub use api::{Resolver, ResolverConfig};
pub use confidence::{
    Confidence, EXACT_STRING_CONFIDENCE, FUZZY_SIMILARITY_FLOOR, MIN_SUGGESTION_CONFIDENCE,
};
pub use error::{ResolveError, Result};
pub use kinds::FieldKind;
pub use matching::{MatchEngine, MatchQuery, ScoredMatch};
pub use merge::MergeCoordinator;
pub use normalize::{content_hash, normalize, Normalized, NormalizerConfig, Quality};
pub use repository::{FuzzyPrefilter, MemoryRepository, MergePlan, Repository, SuggestionFilter};
pub use similarity::{strategies_for, SimilarityStrategy};
pub use suggestion::{
    ResolutionMetrics, SuggestionConfig, SuggestionManager, UndoAction, UndoClaim, UndoEntry,
    UndoRegistry, INVALIDATED_REASON,
};
pub use types::*;
