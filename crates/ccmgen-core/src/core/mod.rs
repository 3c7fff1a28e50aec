//! # Core Module
//!
//! This module provides the stateless building blocks of ccmgen: sequence data, the fitted
//! Markov Random Field, phylogenetic trees and sequence-weighting estimators.
//!
//! ## Architecture
//!
//! - **Sequence Data** ([`models`]) - The protein alphabet and integer-coded alignments
//! - **MRF Potentials** ([`potentials`]) - Single-site fields and pair couplings in one flat
//!   parameter vector, plus contact masking
//! - **Phylogeny** ([`tree`]) - Validated rooted trees and synthesis of binary and star topologies
//! - **Weighting** ([`weighting`]) - Uniform, identity-cutoff and Henikoff weights and Neff estimators
//! - **Gap Handling** ([`gaps`]) - Removal of gappy rows/columns and reinsertion of gap columns
//!
//! Everything here is read-only during sampling and can be shared freely between worker
//! threads. The stateful sampling machinery lives in [`crate::engine`].

pub mod gaps;
pub mod models;
pub mod potentials;
pub mod tree;
pub mod weighting;
