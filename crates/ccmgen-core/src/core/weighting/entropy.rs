use super::NeffEstimator;
use crate::core::models::alignment::Alignment;
use crate::core::models::alphabet::AMINO_ACID_COUNT;

const PSEUDOCOUNT: f64 = 1e-3;

/// Entropy-based Neff in the style of HH-suite: `2^H`, where `H` is the mean
/// Shannon entropy (bits) of the amino-acid distribution over all columns.
///
/// Gaps are ignored. Each amino-acid count receives a pseudocount of 1e-3
/// before normalisation; a column without any amino acid contributes zero
/// entropy. The value ranges from 1 (every column invariant) to 20.
pub fn neff_entropy(msa: &Alignment) -> f64 {
    let ncol = msa.ncol();
    if ncol == 0 {
        return 1.0;
    }

    let mut counts = vec![[0usize; AMINO_ACID_COUNT]; ncol];
    for row in msa.rows() {
        for (column, &state) in row.iter().enumerate() {
            if (state as usize) < AMINO_ACID_COUNT {
                counts[column][state as usize] += 1;
            }
        }
    }

    let total_entropy: f64 = counts.iter().map(|column| column_entropy(column)).sum();
    (total_entropy / ncol as f64).exp2()
}

fn column_entropy(counts: &[usize; AMINO_ACID_COUNT]) -> f64 {
    let observed: usize = counts.iter().sum();
    if observed == 0 {
        return 0.0;
    }
    let norm = observed as f64 + PSEUDOCOUNT * AMINO_ACID_COUNT as f64;
    counts
        .iter()
        .map(|&count| {
            let freq = (count as f64 + PSEUDOCOUNT) / norm;
            -freq * freq.log2()
        })
        .sum()
}

/// [`neff_entropy`] as a [`NeffEstimator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntropyNeff;

impl NeffEstimator for EntropyNeff {
    fn estimate(&self, msa: &Alignment) -> f64 {
        neff_entropy(msa)
    }
}
