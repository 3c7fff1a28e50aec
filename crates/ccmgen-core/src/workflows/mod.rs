//! # Workflows Module
//!
//! This module provides the user-facing entry point of ccmgen.
//!
//! ## Overview
//!
//! A workflow validates its inputs, dispatches once on the configured sampling mode and
//! hands back a finished result. Callers supply potentials, an optional source alignment
//! and a [`crate::engine::config::SamplingConfig`]; no process-wide state is consulted.
//!
//! - **Generation Workflow** ([`generate`]) - Synthetic alignments sampled along a tree at a
//!   fixed mutation rate, along a tree matching a target Neff, or from independent MCMC chains.

pub mod generate;
