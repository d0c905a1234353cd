use std::time::Duration;

use crate::confidence::MIN_SUGGESTION_CONFIDENCE;
use crate::error::{ResolveError, Result};

/// Configuration for the suggestion lifecycle.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    /// Minimum confidence for a match to be surfaced as a suggestion.
    /// Default: 0.5.
    pub min_confidence: f64,

    /// Whether generation runs similarity strategies in addition to the
    /// exact/hash indexes. Default: true.
    pub include_partial: bool,

    /// Minimum similarity for fuzzy candidates. Default: 0.70.
    pub partial_threshold: f64,

    /// How long a dismissal can be undone. Default: 10 seconds.
    pub dismiss_undo_window: Duration,

    /// How long a link can be undone. Shorter: a link creates graph
    /// state other users can already see. Default: 5 seconds.
    pub link_undo_window: Duration,

    /// Minimum length of a merge justification. Merges are irreversible,
    /// so a deliberate reason is required. Default: 10.
    pub min_merge_reason_len: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_confidence: MIN_SUGGESTION_CONFIDENCE,
            include_partial: true,
            partial_threshold: 0.70,
            dismiss_undo_window: Duration::from_secs(10),
            link_undo_window: Duration::from_secs(5),
            min_merge_reason_len: 10,
        }
    }
}

impl SuggestionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = min;
        self
    }

    pub fn with_include_partial(mut self, include: bool) -> Self {
        self.include_partial = include;
        self
    }

    pub fn with_partial_threshold(mut self, threshold: f64) -> Self {
        self.partial_threshold = threshold;
        self
    }

    pub fn with_dismiss_undo_window(mut self, window: Duration) -> Self {
        self.dismiss_undo_window = window;
        self
    }

    pub fn with_link_undo_window(mut self, window: Duration) -> Self {
        self.link_undo_window = window;
        self
    }

    pub fn with_min_merge_reason_len(mut self, len: usize) -> Self {
        self.min_merge_reason_len = len;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ResolveError::Validation(
                "min_confidence must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.partial_threshold) {
            return Err(ResolveError::Validation(
                "partial_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.min_merge_reason_len == 0 {
            return Err(ResolveError::Validation(
                "min_merge_reason_len must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SuggestionConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let config = SuggestionConfig::new().with_partial_threshold(1.5);
        assert!(config.validate().is_err());
    }
}
