//! # Sequence Weighting Module
//!
//! Per-sequence weights and effective sample size (Neff) estimates for integer-coded
//! alignments.
//!
//! ## Overview
//!
//! Natural protein families are redundant: clusters of near-identical sequences would
//! dominate any statistic computed with uniform weights. The policies in this module
//! down-weight over-represented sequences and are used both to score generated
//! alignments and as diagnostics.
//!
//! ## Policies
//!
//! - **Uniform** - every sequence has weight 1
//! - **Simple** ([`simple`]) - inverse size of the identity-cutoff neighbourhood
//! - **Henikoff** ([`henikoff`]) - position-based weights from per-column symbol rarity
//! - **Henikoff pair** ([`henikoff`]) - the same idea applied to column pairs
//!
//! Neff is the sum of the weights. The entropy-based estimator used to steer the
//! tree sampler lives in [`entropy`] and is exposed through the [`NeffEstimator`] trait,
//! which any scoring closure also implements.

pub mod entropy;
pub mod henikoff;
pub mod simple;

use crate::core::models::alignment::Alignment;
use serde::Deserialize;
use thiserror::Error;

pub use entropy::{EntropyNeff, neff_entropy};
pub use henikoff::{weights_henikoff, weights_henikoff_pair};
pub use simple::weights_simple;

#[derive(Debug, Error, PartialEq)]
pub enum WeightingError {
    #[error("Identity cutoff must be a finite, non-negative fraction, got {0}")]
    InvalidCutoff(f64),
}

/// Selects how sequence weights are computed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WeightingPolicy {
    Uniform,
    Simple {
        #[serde(default = "default_cutoff")]
        cutoff: f64,
    },
    Henikoff,
    HenikoffPair,
}

fn default_cutoff() -> f64 {
    0.8
}

impl Default for WeightingPolicy {
    fn default() -> Self {
        WeightingPolicy::Simple {
            cutoff: default_cutoff(),
        }
    }
}

impl WeightingPolicy {
    pub fn validate(&self) -> Result<(), WeightingError> {
        match *self {
            WeightingPolicy::Simple { cutoff } if !cutoff.is_finite() || cutoff < 0.0 => {
                Err(WeightingError::InvalidCutoff(cutoff))
            }
            _ => Ok(()),
        }
    }

    /// Computes the weights without validating the policy parameters.
    pub fn weights(&self, msa: &Alignment, count_gaps: bool) -> Vec<f64> {
        match *self {
            WeightingPolicy::Uniform => weights_uniform(msa),
            WeightingPolicy::Simple { cutoff } => weights_simple(msa, cutoff, count_gaps),
            WeightingPolicy::Henikoff => weights_henikoff(msa, count_gaps),
            WeightingPolicy::HenikoffPair => weights_henikoff_pair(msa, count_gaps),
        }
    }
}

pub fn compute_weights(
    msa: &Alignment,
    policy: WeightingPolicy,
    count_gaps: bool,
) -> Result<Vec<f64>, WeightingError> {
    policy.validate()?;
    Ok(policy.weights(msa, count_gaps))
}

pub fn weights_uniform(msa: &Alignment) -> Vec<f64> {
    vec![1.0; msa.nrow()]
}

/// Effective number of sequences: the sum of the weights.
pub fn neff(weights: &[f64]) -> f64 {
    weights.iter().sum()
}

/// Scores an alignment with an effective-sample-size estimate.
///
/// The Neff-matching controller treats implementors as opaque. Any
/// `Fn(&Alignment) -> f64 + Sync` closure is an estimator.
pub trait NeffEstimator: Sync {
    fn estimate(&self, msa: &Alignment) -> f64;
}

impl<F> NeffEstimator for F
where
    F: Fn(&Alignment) -> f64 + Sync,
{
    fn estimate(&self, msa: &Alignment) -> f64 {
        self(msa)
    }
}

/// Neff as the sum of weights under a fixed policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSumNeff {
    policy: WeightingPolicy,
    count_gaps: bool,
}

impl WeightSumNeff {
    pub fn new(policy: WeightingPolicy, count_gaps: bool) -> Result<Self, WeightingError> {
        policy.validate()?;
        Ok(Self { policy, count_gaps })
    }
}

impl NeffEstimator for WeightSumNeff {
    fn estimate(&self, msa: &Alignment) -> f64 {
        neff(&self.policy.weights(msa, self.count_gaps))
    }
}
