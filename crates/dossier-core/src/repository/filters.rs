use uuid::Uuid;

use crate::types::{Suggestion, SuggestionStatus};

/// Filter criteria for listing suggestions.
///
/// Default listings return pending suggestions only; terminal statuses are
/// retained for audit but must be asked for explicitly.
#[derive(Debug, Clone, Default)]
pub struct SuggestionFilter {
    /// Match suggestions whose source or matched side is this owner.
    pub owner: Option<Uuid>,
    /// Explicit status set. Overrides `include_terminal`.
    pub statuses: Option<Vec<SuggestionStatus>>,
    pub min_confidence: Option<f64>,
    /// Include dismissed/linked/merged suggestions.
    pub include_terminal: bool,
    pub limit: Option<usize>,
}

impl SuggestionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_owner(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<SuggestionStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn include_terminal(mut self) -> Self {
        self.include_terminal = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a suggestion passes this filter (limit excluded).
    pub fn matches(&self, suggestion: &Suggestion) -> bool {
        if let Some(owner) = self.owner {
            if suggestion.source.id() != owner && suggestion.matched.id() != owner {
                return false;
            }
        }
        match &self.statuses {
            Some(statuses) => {
                if !statuses.contains(&suggestion.status) {
                    return false;
                }
            }
            None => {
                if !self.include_terminal && suggestion.status.is_terminal() {
                    return false;
                }
            }
        }
        if let Some(min) = self.min_confidence {
            if suggestion.confidence < min {
                return false;
            }
        }
        true
    }
}

/// Cheap pre-filter for fuzzy candidate retrieval: same first character
/// and a length band around the query. Keeps the candidate scan bounded
/// without the store needing trigram indexes.
#[derive(Debug, Clone)]
pub struct FuzzyPrefilter {
    pub first_char: Option<char>,
    pub min_len: usize,
    pub max_len: usize,
}

impl FuzzyPrefilter {
    /// Derive the pre-filter from a normalized query value.
    pub fn for_value(normalized: &str) -> Self {
        let len = normalized.chars().count();
        let slack = (len / 3).max(2);
        FuzzyPrefilter {
            first_char: normalized.chars().next(),
            min_len: len.saturating_sub(slack),
            max_len: len + slack,
        }
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        let len = candidate.chars().count();
        if len < self.min_len || len > self.max_len {
            return false;
        }
        match self.first_char {
            Some(c) => candidate.chars().next() == Some(c),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::FieldKind;
    use crate::types::{ConfidenceLevel, MatchType, OwnerRef, Suggestion};

    fn suggestion(confidence: f64) -> Suggestion {
        Suggestion::new(
            OwnerRef::Entity(Uuid::now_v7()),
            OwnerRef::Entity(Uuid::now_v7()),
            MatchType::ExactString,
            FieldKind::Email,
            confidence,
            ConfidenceLevel::High,
            vec![],
        )
    }

    #[test]
    fn default_filter_excludes_terminal() {
        let filter = SuggestionFilter::new();
        let mut s = suggestion(0.95);
        assert!(filter.matches(&s));
        s.status = SuggestionStatus::Dismissed;
        assert!(!filter.matches(&s));
        assert!(SuggestionFilter::new().include_terminal().matches(&s));
    }

    #[test]
    fn min_confidence_filters() {
        let filter = SuggestionFilter::new().with_min_confidence(0.9);
        assert!(filter.matches(&suggestion(0.95)));
        assert!(!filter.matches(&suggestion(0.6)));
    }

    #[test]
    fn owner_filter_matches_either_side() {
        let s = suggestion(0.95);
        assert!(SuggestionFilter::new()
            .for_owner(s.source.id())
            .matches(&s));
        assert!(SuggestionFilter::new()
            .for_owner(s.matched.id())
            .matches(&s));
        assert!(!SuggestionFilter::new()
            .for_owner(Uuid::now_v7())
            .matches(&s));
    }

    #[test]
    fn prefilter_band_and_first_char() {
        let pf = FuzzyPrefilter::for_value("john doe");
        assert!(pf.accepts("john doe"));
        assert!(pf.accepts("jon doe"));
        assert!(!pf.accepts("completely different and far too long"));
        assert!(!pf.accepts("mary doe"));
    }
}
