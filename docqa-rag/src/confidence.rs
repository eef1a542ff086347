//! Confidence labels from retrieval scores.

use crate::config::RagConfig;
use crate::document::{Confidence, SearchResult};

/// Label the reliability of a retrieval by its best similarity score.
///
/// No results is [`Confidence::Low`]. Otherwise the maximum score is compared
/// against `high` and `medium`, both inclusive.
pub fn score_confidence(results: &[SearchResult], high: f32, medium: f32) -> Confidence {
    let Some(top) = results.iter().map(|r| r.similarity_score).reduce(f32::max) else {
        return Confidence::Low;
    };
    if top >= high {
        Confidence::High
    } else if top >= medium {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// [`score_confidence`] with the thresholds from `config`.
pub fn confidence_for(config: &RagConfig, results: &[SearchResult]) -> Confidence {
    score_confidence(results, config.confidence_high, config.confidence_medium)
}
