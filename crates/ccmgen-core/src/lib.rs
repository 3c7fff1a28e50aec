//! # ccmgen Core Library
//!
//! Generation of synthetic protein multiple sequence alignments from a pairwise Markov Random
//! Field (single-site fields and pair couplings) fitted to a natural protein family.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture to keep concerns separated.
//!
//! - **[`core`]: The Foundation.** Stateless data: the protein alphabet and integer-coded
//!   `Alignment`, the `Potentials` store, validated phylogenetic `Tree`s, gap filtering and the
//!   sequence-weighting and Neff estimators.
//!
//! - **[`engine`]: The Logic Core.** Gibbs sampling on top of the potentials: the single-column
//!   update, evolution along tree branches, independent MCMC chains and the mutation-rate search
//!   that matches a target Neff, plus configuration, progress reporting and error types.
//!
//! - **[`workflows`]: The Public API.** [`workflows::generate::run`] validates a
//!   `SamplingConfig` and produces a `GenerationResult` in a single call.

pub mod core;
pub mod engine;
pub mod workflows;
