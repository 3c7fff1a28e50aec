use rand::distributions::{WeightedError, WeightedIndex};
use rand::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SamplingError {
    #[error("Conditional score vector is empty, cannot perform sampling")]
    EmptyScores,
    #[error("Non-finite conditional score {score} for state {state}")]
    NonFiniteScore { state: usize, score: f64 },
    #[error("Failed to create weighted distribution: {source}")]
    Distribution {
        #[from]
        source: WeightedError,
    },
}

/// Draws one state from unnormalised log-probabilities.
///
/// `scores` is overwritten with the shifted Boltzmann weights
/// `exp(score - max)`. The maximum state always carries weight 1, so the
/// distribution is never empty.
pub fn draw_state(scores: &mut [f64], rng: &mut impl Rng) -> Result<usize, SamplingError> {
    exp_weights_in_place(scores)?;
    let dist = WeightedIndex::new(scores.iter())?;
    Ok(dist.sample(rng))
}

/// Replaces every score with `exp(score - max)`.
pub fn exp_weights_in_place(scores: &mut [f64]) -> Result<(), SamplingError> {
    if scores.is_empty() {
        return Err(SamplingError::EmptyScores);
    }
    if let Some((state, &score)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(SamplingError::NonFiniteScore { state, score });
    }

    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for score in scores.iter_mut() {
        *score = (*score - max).exp();
    }
    Ok(())
}
