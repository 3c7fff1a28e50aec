//! Sampling tasks that turn fitted potentials into synthetic alignments.
//!
//! Each submodule implements one stage of generation: the single-column Gibbs
//! update and its branch-mutation variant, sampling along a phylogenetic tree,
//! independent MCMC chains, and the rate search that matches a target Neff.
//! Tasks share the potentials read-only and own every sequence buffer they write.

use crate::engine::error::EngineError;

pub mod gibbs;
pub mod mcmc;
pub mod neff_matching;
pub mod tree_sampling;

/// Reserves a zeroed code buffer of `rows * cols` entries without aborting on
/// allocation failure.
pub(crate) fn allocate_codes(rows: usize, cols: usize) -> Result<Vec<u8>, EngineError> {
    let len = rows
        .checked_mul(cols)
        .ok_or(EngineError::Allocation { rows, cols })?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation { rows, cols })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_codes_returns_zeroed_buffer() {
        assert_eq!(allocate_codes(3, 4).unwrap(), vec![0; 12]);
        assert!(allocate_codes(0, 7).unwrap().is_empty());
    }

    #[test]
    fn allocate_codes_reports_unrepresentable_sizes() {
        assert!(matches!(
            allocate_codes(usize::MAX, 2),
            Err(EngineError::Allocation {
                rows: usize::MAX,
                cols: 2
            })
        ));
        assert!(matches!(
            allocate_codes(usize::MAX, 1),
            Err(EngineError::Allocation { .. })
        ));
    }
}
