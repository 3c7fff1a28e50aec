use super::weights_uniform;
use crate::core::models::alignment::Alignment;
use crate::core::models::alphabet::GAP;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Identity-cutoff weighting (Morcos et al. 2011).
///
/// A sequence's weight is the inverse of the number of sequences, itself
/// included, whose fractional identity to it exceeds `cutoff`. Identity is the
/// number of identical positions over the alignment width; positions where
/// both sequences hold a gap only count as identical when `count_gaps` is set.
/// A cutoff of 1 or more can never be exceeded, so uniform weights are
/// returned without any pairwise comparison.
#[instrument(level = "debug", skip(msa), fields(nrow = msa.nrow(), ncol = msa.ncol()))]
pub fn weights_simple(msa: &Alignment, cutoff: f64, count_gaps: bool) -> Vec<f64> {
    if cutoff >= 1.0 || msa.ncol() == 0 {
        return weights_uniform(msa);
    }

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..msa.nrow();

    #[cfg(feature = "parallel")]
    let iterator = (0..msa.nrow()).into_par_iter();

    iterator
        .map(|n| {
            let reference = msa.row(n);
            let neighbours = msa
                .rows()
                .enumerate()
                .filter(|&(m, other)| m != n && identity(reference, other, count_gaps) > cutoff)
                .count();
            1.0 / (1 + neighbours) as f64
        })
        .collect()
}

fn identity(a: &[u8], b: &[u8], count_gaps: bool) -> f64 {
    let identical = a
        .iter()
        .zip(b)
        .filter(|&(&x, &y)| x == y && (count_gaps || x != GAP))
        .count();
    identical as f64 / a.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicated_sequences_share_their_weight() {
        let msa = Alignment::from_sequences(&["ARNDC", "ARNDC", "WYVKL"]).unwrap();
        let weights = weights_simple(&msa, 0.8, false);
        assert_eq!(weights, vec![0.5, 0.5, 1.0]);
    }

    #[test]
    fn identity_must_strictly_exceed_cutoff() {
        let msa = Alignment::from_sequences(&["ARNDC", "ARNDW"]).unwrap();
        assert_eq!(weights_simple(&msa, 0.8, false), vec![1.0, 1.0]);
        assert_eq!(weights_simple(&msa, 0.79, false), vec![0.5, 0.5]);
    }

    #[test]
    fn shared_gaps_only_count_as_identity_when_requested() {
        let msa = Alignment::from_sequences(&["AR---", "AR---"]).unwrap();
        assert_eq!(weights_simple(&msa, 0.5, false), vec![1.0, 1.0]);
        assert_eq!(weights_simple(&msa, 0.5, true), vec![0.5, 0.5]);
    }

    #[test]
    fn cutoff_of_one_returns_uniform_weights() {
        let msa = Alignment::from_sequences(&["ARNDC", "ARNDC"]).unwrap();
        assert_eq!(weights_simple(&msa, 1.0, true), vec![1.0, 1.0]);
    }
}
