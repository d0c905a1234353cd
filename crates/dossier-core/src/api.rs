use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::error::{ResolveError, Result};
use crate::kinds::FieldKind;
use crate::matching::{MatchEngine, MatchQuery, ScoredMatch};
use crate::normalize::{self, NormalizerConfig, Quality};
use crate::repository::{MemoryRepository, Repository, SuggestionFilter};
use crate::suggestion::{ResolutionMetrics, SuggestionConfig, SuggestionManager};
use crate::types::{
    DataItem, Entity, EntityId, MergeRecord, OrphanId, OwnerRef, Suggestion, SuggestionId,
};

/// Config for the embedded resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub normalizer: NormalizerConfig,
    pub suggestion: SuggestionConfig,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_suggestion(mut self, suggestion: SuggestionConfig) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.suggestion.validate()
    }
}

/// High-level, embedded resolution API over a repository.
///
/// # Example
/// ```rust
/// use dossier_core::{FieldKind, OwnerRef, Resolver};
///
/// let resolver = Resolver::in_memory();
/// let alice = resolver.create_entity("Alice Example").unwrap();
/// let (item, suggestions) = resolver
///     .attach_item(OwnerRef::Entity(alice.id), FieldKind::Email, "alice@example.com")
///     .unwrap();
/// assert_eq!(item.normalized_value.as_deref(), Some("alice@example.com"));
/// assert!(suggestions.is_empty());
/// ```
pub struct Resolver<R: Repository> {
    repo: Arc<R>,
    engine: MatchEngine<R>,
    manager: SuggestionManager<R>,
    config: ResolverConfig,
}

impl Resolver<MemoryRepository> {
    /// An in-memory resolver with default configuration. Intended for
    /// tests and embedded experimentation.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()), ResolverConfig::default())
            .expect("default configuration is valid")
    }
}

impl<R: Repository> Resolver<R> {
    pub fn new(repo: Arc<R>, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let engine = MatchEngine::new(repo.clone()).with_normalizer(config.normalizer.clone());
        let manager =
            SuggestionManager::new(repo.clone(), engine.clone(), config.suggestion.clone())?;
        Ok(Self {
            repo,
            engine,
            manager,
            config,
        })
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Create and store a new entity.
    pub fn create_entity(&self, name: &str) -> Result<Entity> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ResolveError::Validation(
                "entity name must not be empty".into(),
            ));
        }
        let entity = Entity::new(name);
        self.repo.put_entity(&entity)?;
        Ok(entity)
    }

    /// Get an entity, following merge redirects to the surviving record.
    pub fn get_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        let resolved = self.repo.resolve_entity_id(id)?;
        self.repo.get_entity(resolved)
    }

    /// Register a new orphan identifier cluster.
    pub fn register_orphan(&self) -> Result<OrphanId> {
        let id = Uuid::now_v7();
        self.repo.register_orphan(id)?;
        Ok(id)
    }

    /// Store a string data item for an owner and generate suggestions
    /// for everything it matches.
    pub fn attach_item(
        &self,
        owner: OwnerRef,
        kind: FieldKind,
        raw_value: &str,
    ) -> Result<(DataItem, Vec<Suggestion>)> {
        if kind.is_binary() {
            return Err(ResolveError::Validation(
                "binary items must be attached with attach_binary".into(),
            ));
        }
        self.require_owner(owner)?;

        let mut item = DataItem::with_config(kind, raw_value, Some(owner), &self.config.normalizer);
        if let Some(normalized) = normalize::normalize(kind, raw_value, &self.config.normalizer) {
            if normalized.quality == Quality::BestEffort {
                log::warn!(
                    "Data item {} ({kind}) normalized on a best-effort basis",
                    item.id
                );
                item.metadata
                    .insert("normalization_quality".into(), json!("best_effort"));
            }
        }
        self.repo.put_data_item(&item)?;

        let suggestions = self.manager.generate_for_item(&item)?;
        Ok((item, suggestions))
    }

    /// Store binary content for an owner and generate suggestions for
    /// identical content elsewhere in the store.
    pub fn attach_binary(
        &self,
        owner: OwnerRef,
        label: &str,
        bytes: &[u8],
    ) -> Result<(DataItem, Vec<Suggestion>)> {
        self.require_owner(owner)?;
        let item = DataItem::binary(label, bytes, Some(owner));
        self.repo.put_data_item(&item)?;
        let suggestions = self.manager.generate_for_item(&item)?;
        Ok((item, suggestions))
    }

    /// Run the matching engine without creating suggestions.
    pub fn find_matches(
        &self,
        value: &str,
        kind: FieldKind,
        query: &MatchQuery,
    ) -> Result<Vec<ScoredMatch>> {
        self.engine.find_matches(value, kind, query)
    }

    /// Run the matching engine over binary content.
    pub fn find_binary_matches(
        &self,
        bytes: &[u8],
        query: &MatchQuery,
    ) -> Result<Vec<ScoredMatch>> {
        self.engine.find_binary_matches(bytes, query)
    }

    /// List suggestions; stale ones are invalidated lazily.
    pub fn list_suggestions(&self, filter: &SuggestionFilter) -> Result<Vec<Suggestion>> {
        self.manager.list(filter)
    }

    pub fn dismiss_suggestion(&self, id: SuggestionId, reason: &str) -> Result<Suggestion> {
        self.manager.dismiss(id, reason)
    }

    pub fn link_suggestion(&self, id: SuggestionId) -> Result<Suggestion> {
        self.manager.link(id)
    }

    /// Merge the suggestion's pair, source entity winning. Irreversible.
    pub fn merge_suggestion(&self, id: SuggestionId, reason: &str) -> Result<MergeRecord> {
        self.manager.merge(id, reason)
    }

    /// Merge with an explicit winner from the suggestion's pair.
    pub fn merge_suggestion_with_winner(
        &self,
        id: SuggestionId,
        winner: EntityId,
        reason: &str,
    ) -> Result<MergeRecord> {
        self.manager.merge_with_winner(id, winner, reason)
    }

    /// Revert the last dismiss/link while its undo window is open.
    pub fn undo(&self, id: SuggestionId) -> Result<Suggestion> {
        self.manager.undo(id)
    }

    /// Finalize expired undo windows (hygiene).
    pub fn sweep_expired_undos(&self) -> Result<usize> {
        self.manager.sweep_expired()
    }

    pub fn metrics(&self) -> Result<ResolutionMetrics> {
        self.manager.metrics_snapshot()
    }

    /// The append-only merge audit log.
    pub fn merge_records(&self) -> Result<Vec<MergeRecord>> {
        self.repo.list_merge_records()
    }

    fn require_owner(&self, owner: OwnerRef) -> Result<()> {
        match owner {
            OwnerRef::Entity(id) => match self.repo.get_entity(id)? {
                Some(entity) if !entity.retired => Ok(()),
                _ => Err(ResolveError::EntityNotFound(id)),
            },
            OwnerRef::Orphan(id) => {
                if self.repo.orphan_exists(id)? {
                    Ok(())
                } else {
                    Err(ResolveError::OrphanNotFound(id))
                }
            }
        }
    }
}
