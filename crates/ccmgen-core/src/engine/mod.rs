//! # Engine Module
//!
//! This module implements the stateful sampling machinery of ccmgen: Gibbs updates driven by the
//! fitted potentials, sampling along phylogenetic trees, independent MCMC chains, and the
//! mutation-rate search that matches a target effective number of sequences.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Sampling mode, burn-in, seeding and thread settings, built in
//!   code or loaded from TOML
//! - **Sampling Tasks** ([`tasks`]) - Gibbs step, tree sampler, MCMC sampler and Neff matching
//! - **Random Streams** ([`rng`]) - Per-worker seed derivation for reproducible parallel runs
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - The aggregated [`error::EngineError`]
//!
//! Tasks read the potentials and tree through shared references and own every sequence buffer
//! they write, so independent edges and chains are distributed over rayon workers when the
//! `parallel` feature is enabled.

pub mod config;
pub mod error;
pub mod progress;
pub mod rng;
pub mod tasks;
pub mod utils;
