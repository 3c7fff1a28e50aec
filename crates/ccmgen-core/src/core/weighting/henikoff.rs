use crate::core::models::alignment::Alignment;
use crate::core::models::alphabet::{ALPHABET_SIZE, GAP};
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Position-based sequence weights (Henikoff & Henikoff, 1994).
///
/// For every column the states are counted (the gap count is zeroed unless
/// `count_gaps`), and each sequence collects `1 / (count * unique)` for the
/// state it carries, where `unique` is the number of distinct states observed
/// in that column. Columns whose state has a zero count, i.e. excluded gaps,
/// contribute nothing.
#[instrument(level = "debug", skip(msa), fields(nrow = msa.nrow(), ncol = msa.ncol()))]
pub fn weights_henikoff(msa: &Alignment, count_gaps: bool) -> Vec<f64> {
    let mut counts = vec![[0usize; ALPHABET_SIZE]; msa.ncol()];
    for row in msa.rows() {
        for (column, &state) in row.iter().enumerate() {
            counts[column][state as usize] += 1;
        }
    }
    if !count_gaps {
        for column in &mut counts {
            column[GAP as usize] = 0;
        }
    }
    let unique: Vec<usize> = counts
        .iter()
        .map(|column| column.iter().filter(|&&n| n > 0).count())
        .collect();

    msa.rows()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter_map(|(column, &state)| {
                    let count = counts[column][state as usize];
                    (count > 0).then(|| 1.0 / (count * unique[column]) as f64)
                })
                .sum()
        })
        .collect()
}

/// Henikoff weights over column pairs `k < l`.
///
/// Pair counts are gathered one column pair at a time so memory stays at
/// `A x A` per worker instead of the full `L x L x A x A` tensor. Pairs that
/// involve a gap are skipped unless `count_gaps` is set. The cost is quadratic
/// in the alignment width; column blocks are processed in parallel.
#[instrument(level = "debug", skip(msa), fields(nrow = msa.nrow(), ncol = msa.ncol()))]
pub fn weights_henikoff_pair(msa: &Alignment, count_gaps: bool) -> Vec<f64> {
    let ncol = msa.ncol();

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..ncol;

    #[cfg(feature = "parallel")]
    let iterator = (0..ncol).into_par_iter();

    let partials: Vec<Vec<f64>> = iterator
        .map(|k| pair_contributions(msa, k, count_gaps))
        .collect();

    let mut weights = vec![0.0; msa.nrow()];
    for partial in partials {
        for (total, value) in weights.iter_mut().zip(partial) {
            *total += value;
        }
    }
    weights
}

fn pair_contributions(msa: &Alignment, k: usize, count_gaps: bool) -> Vec<f64> {
    let mut contributions = vec![0.0; msa.nrow()];
    let mut counts = [0usize; ALPHABET_SIZE * ALPHABET_SIZE];
    let skip = |a: u8, b: u8| !count_gaps && (a == GAP || b == GAP);

    for l in (k + 1)..msa.ncol() {
        counts.fill(0);
        for row in msa.rows() {
            let (a, b) = (row[k], row[l]);
            if !skip(a, b) {
                counts[a as usize * ALPHABET_SIZE + b as usize] += 1;
            }
        }
        let unique = counts.iter().filter(|&&n| n > 0).count();

        for (n, row) in msa.rows().enumerate() {
            let (a, b) = (row[k], row[l]);
            if skip(a, b) {
                continue;
            }
            let count = counts[a as usize * ALPHABET_SIZE + b as usize];
            contributions[n] += 1.0 / (count * unique) as f64;
        }
    }
    contributions
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    fn henikoff_reference_alignment() -> Alignment {
        Alignment::from_rows(&[
            vec![0u8, 1, 3, 0, 6],
            vec![0, 2, 4, 0, 2],
            vec![0, 1, 4, 0, 2],
            vec![0, 1, 5, 0, 0],
        ])
        .unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < TOLERANCE, "{a} != {e}");
        }
    }

    #[test]
    fn henikoff_reproduces_published_example() {
        let weights = weights_henikoff(&henikoff_reference_alignment(), false);
        assert_close(&weights, &[1.333333, 1.333333, 1.0, 1.333333]);
    }

    #[test]
    fn henikoff_skips_gaps_unless_counted() {
        let msa = Alignment::from_sequences(&["A-", "AC"]).unwrap();
        assert_close(&weights_henikoff(&msa, false), &[0.5, 1.5]);
        assert_close(&weights_henikoff(&msa, true), &[1.0, 1.0]);
    }

    #[test]
    fn henikoff_pair_on_single_column_pair_matches_manual_counts() {
        let msa = Alignment::from_rows(&[vec![0u8, 1], vec![0, 1], vec![2, 3]]).unwrap();
        assert_close(&weights_henikoff_pair(&msa, false), &[0.25, 0.25, 0.5]);
    }

    #[test]
    fn henikoff_pair_skips_pairs_with_gaps_unless_counted() {
        let msa = Alignment::from_sequences(&["AR", "A-"]).unwrap();
        assert_close(&weights_henikoff_pair(&msa, false), &[1.0, 0.0]);
        assert_close(&weights_henikoff_pair(&msa, true), &[0.5, 0.5]);
    }

    #[test]
    fn henikoff_pair_sums_over_all_column_pairs() {
        let msa = Alignment::from_sequences(&["ARN", "ARN"]).unwrap();
        // three column pairs, each with one unique pair observed twice
        assert_close(&weights_henikoff_pair(&msa, false), &[1.5, 1.5]);
    }
}
