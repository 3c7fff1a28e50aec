use super::config::ConfigError;
use super::utils::sampling::SamplingError;
use crate::core::gaps::GapError;
use crate::core::models::alignment::AlignmentError;
use crate::core::potentials::PotentialsError;
use crate::core::tree::TreeError;
use crate::core::weighting::WeightingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid tree: {0}")]
    Tree(#[from] TreeError),

    #[error("Invalid potentials: {0}")]
    Potentials(#[from] PotentialsError),

    #[error("Invalid alignment: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Gap handling failed: {0}")]
    Gaps(#[from] GapError),

    #[error("Invalid weighting policy: {0}")]
    Weighting(#[from] WeightingError),

    #[error("Alignment has {found} columns but the potentials cover {expected}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("Numerical failure in sequence {sequence} at column {column}: {source}")]
    Numerical {
        sequence: usize,
        column: usize,
        #[source]
        source: SamplingError,
    },

    #[error("Could not allocate {rows}x{cols} sequence buffer")]
    Allocation { rows: usize, cols: usize },

    #[error("Failed to build worker thread pool: {0}")]
    ThreadPool(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
