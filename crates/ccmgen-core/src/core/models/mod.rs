//! # Core Models Module
//!
//! This module contains the sequence-level data structures shared by every sampler and
//! estimator in ccmgen.
//!
//! ## Key Components
//!
//! - [`alphabet`] - The 21-state protein alphabet (20 amino acids plus gap) and symbol lookup
//! - [`alignment`] - Integer-coded, row-major multiple sequence alignments
//!
//! ## Usage
//!
//! ```ignore
//! use ccmgen::core::models::alignment::Alignment;
//!
//! let msa = Alignment::from_sequences(&["ARND-", "ARNE-"])?;
//! assert_eq!(msa.ncol(), 5);
//! ```

pub mod alignment;
pub mod alphabet;
