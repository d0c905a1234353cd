use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence::{self, Confidence};
use crate::error::{ResolveError, Result};
use crate::kinds::FieldKind;
use crate::normalize::{self, NormalizerConfig};
use crate::repository::{FuzzyPrefilter, Repository};
use crate::similarity::strategies_for;
use crate::types::{MatchResult, MatchType};

/// Options for a match query.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    /// Also run similarity strategies over pre-filtered candidates.
    pub include_partial: bool,
    /// Minimum similarity for a fuzzy candidate to be kept.
    pub partial_threshold: f64,
    /// Owner id to suppress (self-match).
    pub exclude_id: Option<Uuid>,
    pub limit: Option<usize>,
}

impl Default for MatchQuery {
    fn default() -> Self {
        Self {
            include_partial: true,
            partial_threshold: 0.70,
            exclude_id: None,
            limit: None,
        }
    }
}

impl MatchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_partial(mut self, include: bool) -> Self {
        self.include_partial = include;
        self
    }

    pub fn with_partial_threshold(mut self, threshold: f64) -> Self {
        self.partial_threshold = threshold;
        self
    }

    pub fn excluding(mut self, owner_id: Uuid) -> Self {
        self.exclude_id = Some(owner_id);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.partial_threshold) {
            return Err(ResolveError::Validation(
                "partial_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// A candidate hit with its scored confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMatch {
    pub result: MatchResult,
    pub match_type: MatchType,
    pub confidence: Confidence,
}

/// Read-only match fan-out: normalize the query, collect exact/hash hits
/// from the store's indexes, optionally score pre-filtered fuzzy
/// candidates, and return a deterministically ordered result set.
pub struct MatchEngine<R: Repository> {
    repo: Arc<R>,
    normalizer: NormalizerConfig,
}

impl<R: Repository> Clone for MatchEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            normalizer: self.normalizer.clone(),
        }
    }
}

impl<R: Repository> MatchEngine<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            normalizer: NormalizerConfig::default(),
        }
    }

    pub fn with_normalizer(mut self, config: NormalizerConfig) -> Self {
        self.normalizer = config;
        self
    }

    /// Find candidate matches for a string value of the given kind.
    ///
    /// For binary kinds the value is interpreted as a content hash; use
    /// [`find_binary_matches`](Self::find_binary_matches) when holding
    /// raw bytes.
    pub fn find_matches(
        &self,
        value: &str,
        kind: FieldKind,
        query: &MatchQuery,
    ) -> Result<Vec<ScoredMatch>> {
        query.validate()?;

        if kind.is_binary() {
            let hits = self.hash_candidates(value, query)?;
            return self.finalize(hits, query);
        }

        let normalized = normalize::normalize(kind, value, &self.normalizer)
            .map(|n| n.value)
            .unwrap_or_default();

        // An empty normalized form carries no signal; matching empties
        // against each other would only manufacture false positives.
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = Vec::new();
        for result in self
            .repo
            .find_by_normalized_value(kind, &normalized, query.exclude_id)?
        {
            scored.push(ScoredMatch {
                result,
                match_type: MatchType::ExactString,
                confidence: confidence::exact_string(),
            });
        }

        if query.include_partial {
            scored.extend(self.fuzzy_candidates(&normalized, kind, query)?);
        }

        self.finalize(scored, query)
    }

    /// Find candidate matches for binary content by its SHA-256.
    pub fn find_binary_matches(&self, bytes: &[u8], query: &MatchQuery) -> Result<Vec<ScoredMatch>> {
        query.validate()?;
        let hash = normalize::content_hash(bytes);
        let hits = self.hash_candidates(&hash, query)?;
        self.finalize(hits, query)
    }

    fn hash_candidates(&self, hash: &str, query: &MatchQuery) -> Result<Vec<ScoredMatch>> {
        Ok(self
            .repo
            .find_by_content_hash(hash, query.exclude_id)?
            .into_iter()
            .map(|result| ScoredMatch {
                result,
                match_type: MatchType::HashMatch,
                confidence: confidence::hash_match(),
            })
            .collect())
    }

    fn fuzzy_candidates(
        &self,
        normalized: &str,
        kind: FieldKind,
        query: &MatchQuery,
    ) -> Result<Vec<ScoredMatch>> {
        let prefilter = FuzzyPrefilter::for_value(normalized);
        let candidates = self.repo.find_candidates_for_fuzzy(kind, &prefilter)?;
        let strategies = strategies_for(kind);

        // CPU-bound scoring over independent candidates; no shared state.
        let scored: Vec<ScoredMatch> = candidates
            .par_iter()
            .filter(|item| {
                // Equal-normalized candidates are already exact hits.
                item.normalized_value.as_deref() != Some(normalized)
            })
            .filter(|item| match (query.exclude_id, item.owner) {
                (Some(exclude), Some(owner)) => owner.id() != exclude,
                _ => true,
            })
            .filter_map(|item| {
                let candidate = item.normalized_value.as_deref()?;
                let owner = item.owner?;
                let mut best: Option<(f64, &'static str)> = None;
                for strategy in strategies {
                    if let Some(score) = strategy.score(normalized, candidate) {
                        if best.map(|(b, _)| score > b).unwrap_or(true) {
                            best = Some((score, strategy.name()));
                        }
                    }
                }
                let (similarity, strategy) = best?;
                if similarity < query.partial_threshold {
                    return None;
                }
                let confidence = confidence::fuzzy(similarity, strategy)?;
                Some(ScoredMatch {
                    result: MatchResult {
                        owner,
                        field_kind: item.kind,
                        field_path: None,
                        data_item_id: Some(item.id),
                        updated_at: item.updated_at,
                    },
                    match_type: MatchType::FuzzyMatch,
                    confidence,
                })
            })
            .collect();

        Ok(scored)
    }

    /// Exclusion of decided pairs, per-owner de-duplication, and the
    /// deterministic ordering contract: confidence descending, then
    /// match-type specificity, then most recently updated candidate,
    /// then owner id so equal candidates still have a total order.
    fn finalize(&self, scored: Vec<ScoredMatch>, query: &MatchQuery) -> Result<Vec<ScoredMatch>> {
        let mut best_per_owner: HashMap<Uuid, ScoredMatch> = HashMap::new();
        for m in scored {
            let owner_id = m.result.owner.id();
            match best_per_owner.get(&owner_id) {
                Some(existing) if !ranks_higher(&m, existing) => {}
                _ => {
                    best_per_owner.insert(owner_id, m);
                }
            }
        }

        let mut out: Vec<ScoredMatch> = Vec::with_capacity(best_per_owner.len());
        for (owner_id, m) in best_per_owner {
            // A pair the user already decided must not be re-proposed.
            if let Some(source) = query.exclude_id {
                if let Some(existing) = self.repo.find_suggestion_for_pair(source, owner_id)? {
                    if existing.status.is_terminal() {
                        continue;
                    }
                }
            }
            out.push(m);
        }

        out.sort_by(|a, b| {
            b.confidence
                .value
                .total_cmp(&a.confidence.value)
                .then_with(|| b.match_type.specificity().cmp(&a.match_type.specificity()))
                .then_with(|| b.result.updated_at.cmp(&a.result.updated_at))
                .then_with(|| a.result.owner.id().cmp(&b.result.owner.id()))
        });

        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

fn ranks_higher(a: &ScoredMatch, b: &ScoredMatch) -> bool {
    a.confidence
        .value
        .total_cmp(&b.confidence.value)
        .then_with(|| a.match_type.specificity().cmp(&b.match_type.specificity()))
        .then_with(|| a.result.updated_at.cmp(&b.result.updated_at))
        .then_with(|| b.result.data_item_id.cmp(&a.result.data_item_id))
        .is_gt()
}
