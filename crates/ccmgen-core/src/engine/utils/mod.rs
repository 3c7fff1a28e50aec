//! Utility functions for the engine module.
//!
//! This module provides the numerical helpers shared by the sampling tasks, most
//! importantly the categorical draw used by every Gibbs step.

pub mod sampling;
