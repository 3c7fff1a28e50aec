use super::tree_sampling::{TreeSample, propagate, sample_ancestor};
use crate::core::potentials::Potentials;
use crate::core::tree::Tree;
use crate::core::weighting::NeffEstimator;
use crate::engine::config::NeffMatchingConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{debug, info, instrument, warn};

/// The evaluated tree sample whose Neff came closest to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct NeffMatch {
    pub sample: TreeSample,
    pub mutation_rate: f64,
    pub neff: f64,
    /// Number of tree samples drawn, the rate-0 baseline included.
    pub iterations: usize,
    pub target_reached: bool,
}

struct Search<'a, E: NeffEstimator + ?Sized> {
    potentials: &'a Potentials,
    tree: &'a Tree,
    ancestor: Vec<u8>,
    seed: u64,
    estimator: &'a E,
    target: f64,
    tolerance: f64,
    iterations: usize,
    best: Option<NeffMatch>,
}

impl<E: NeffEstimator + ?Sized> Search<'_, E> {
    /// Samples the tree at `rate` and returns the achieved Neff.
    fn evaluate(&mut self, rate: f64, reporter: &ProgressReporter) -> Result<f64, EngineError> {
        let sample = propagate(
            self.potentials,
            self.tree,
            &self.ancestor,
            rate,
            self.seed,
            &ProgressReporter::new(),
        )?;
        let neff = self.estimator.estimate(&sample.alignment);
        self.iterations += 1;
        debug!(iteration = self.iterations, rate, neff, "Evaluated mutation rate.");
        reporter.report(Progress::RateEvaluated { rate, neff });

        let closer = self
            .best
            .as_ref()
            .is_none_or(|best| (neff - self.target).abs() < (best.neff - self.target).abs());
        if closer {
            self.best = Some(NeffMatch {
                sample,
                mutation_rate: rate,
                neff,
                iterations: 0,
                target_reached: false,
            });
        }
        Ok(neff)
    }

    fn within_tolerance(&self, neff: f64) -> bool {
        (neff - self.target).abs() <= self.tolerance
    }

    fn finish(self) -> Result<NeffMatch, EngineError> {
        let target = self.target;
        let tolerance = self.tolerance;
        let iterations = self.iterations;
        let mut best = self
            .best
            .ok_or_else(|| EngineError::Internal("Neff search finished without samples".into()))?;
        best.iterations = iterations;
        best.target_reached = (best.neff - target).abs() <= tolerance;
        if best.target_reached {
            info!(
                rate = best.mutation_rate,
                neff = best.neff,
                iterations,
                "Matched target Neff."
            );
        } else {
            warn!(
                target,
                neff = best.neff,
                rate = best.mutation_rate,
                iterations,
                "Target Neff not reached; returning the closest sample."
            );
        }
        Ok(best)
    }
}

/// Searches the mutation rate whose tree sample matches `target` Neff.
///
/// Every evaluation reuses the same ancestor and per-edge random streams, so
/// the achieved Neff is a deterministic function of the rate. The search
/// evaluates rate 0, expands geometrically from `initial_rate` until the Neff
/// reaches the target band, then bisects. Running out of iterations is not an
/// error: the closest sample is returned with `target_reached == false`.
#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, name = "neff_matching_task")]
pub fn run<E: NeffEstimator + ?Sized>(
    potentials: &Potentials,
    tree: &Tree,
    burn_in: usize,
    seed: u64,
    target: f64,
    matching: &NeffMatchingConfig,
    estimator: &E,
    reporter: &ProgressReporter,
) -> Result<NeffMatch, EngineError> {
    let tolerance = matching.rel_tolerance * target;
    info!(target, tolerance, "Searching mutation rate for target Neff.");
    let ancestor = sample_ancestor(potentials, burn_in, seed, tree.root())?;
    let mut search = Search {
        potentials,
        tree,
        ancestor,
        seed,
        estimator,
        target,
        tolerance,
        iterations: 0,
        best: None,
    };

    let baseline = search.evaluate(0.0, reporter)?;
    if baseline >= target - tolerance {
        return search.finish();
    }

    let mut lower = 0.0;
    let mut rate = matching.initial_rate;
    let mut upper = None;
    while search.iterations < matching.max_iterations && rate.is_finite() {
        let neff = search.evaluate(rate, reporter)?;
        if search.within_tolerance(neff) {
            return search.finish();
        }
        if neff < target {
            lower = rate;
            rate *= matching.growth;
        } else {
            upper = Some(rate);
            break;
        }
    }

    if let Some(mut upper) = upper {
        while search.iterations < matching.max_iterations {
            let mid = 0.5 * (lower + upper);
            let neff = search.evaluate(mid, reporter)?;
            if search.within_tolerance(neff) {
                break;
            }
            if neff < target {
                lower = mid;
            } else {
                upper = mid;
            }
        }
    }

    search.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::alignment::Alignment;
    use crate::core::models::alphabet::AMINO_ACID_COUNT;
    use crate::core::potentials::tests::random_potentials;
    use crate::core::weighting::EntropyNeff;

    /// Independent sites that strongly prefer state 5 over the all-`A` ancestor.
    fn drifting_potentials(ncol: usize) -> Potentials {
        let mut field = vec![0.0; ncol * AMINO_ACID_COUNT];
        for column in 0..ncol {
            field[column * AMINO_ACID_COUNT + 5] = 10.0;
        }
        Potentials::independent(ncol, AMINO_ACID_COUNT, field).unwrap()
    }

    fn mutated_fraction_neff(msa: &Alignment) -> f64 {
        let mutated = msa.as_slice().iter().filter(|&&code| code != 0).count();
        1.0 + 9.0 * mutated as f64 / msa.as_slice().len() as f64
    }

    #[test]
    fn target_at_unmutated_neff_yields_rate_zero() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 31);
        let tree = Tree::binary(16).unwrap();
        let unmutated = {
            let ancestor = sample_ancestor(&potentials, 5, 3, tree.root()).unwrap();
            let sample =
                propagate(&potentials, &tree, &ancestor, 0.0, 3, &ProgressReporter::new()).unwrap();
            EntropyNeff.estimate(&sample.alignment)
        };

        for target in [unmutated, 0.5 * unmutated] {
            let result = run(
                &potentials,
                &tree,
                5,
                3,
                target,
                &NeffMatchingConfig::with_target(target),
                &EntropyNeff,
                &ProgressReporter::new(),
            )
            .unwrap();
            assert_eq!(result.mutation_rate, 0.0);
            assert_eq!(result.iterations, 1);
        }
    }

    #[test]
    fn higher_target_never_selects_a_lower_rate_than_unmutated_target() {
        let potentials = drifting_potentials(10);
        let tree = Tree::star(50).unwrap();
        let config = NeffMatchingConfig {
            rel_tolerance: 0.1,
            ..NeffMatchingConfig::default()
        };
        let at_ancestor = run(
            &potentials,
            &tree,
            0,
            7,
            1.0,
            &config,
            &mutated_fraction_neff,
            &ProgressReporter::new(),
        )
        .unwrap();
        let higher = run(
            &potentials,
            &tree,
            0,
            7,
            5.0,
            &config,
            &mutated_fraction_neff,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(at_ancestor.mutation_rate, 0.0);
        assert!(at_ancestor.target_reached);
        assert!(higher.mutation_rate > at_ancestor.mutation_rate);
        assert!(higher.target_reached, "neff = {}", higher.neff);
        assert!((higher.neff - 5.0).abs() <= 0.5);
        assert_eq!(higher.sample.alignment.nrow(), 50);
    }

    #[test]
    fn unreachable_target_reports_non_convergence() {
        let potentials = drifting_potentials(4);
        let tree = Tree::star(8).unwrap();
        let config = NeffMatchingConfig {
            max_iterations: 5,
            ..NeffMatchingConfig::with_target(100.0)
        };
        let result = run(
            &potentials,
            &tree,
            0,
            1,
            100.0,
            &config,
            &|_: &Alignment| 1.0,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(!result.target_reached);
        assert_eq!(result.iterations, 5);
        assert_eq!(result.neff, 1.0);
    }

    #[test]
    fn search_is_reproducible_for_a_fixed_seed() {
        let potentials = drifting_potentials(6);
        let tree = Tree::binary(12).unwrap();
        let config = NeffMatchingConfig::default();
        let search = || {
            run(
                &potentials,
                &tree,
                0,
                19,
                4.0,
                &config,
                &mutated_fraction_neff,
                &ProgressReporter::new(),
            )
            .unwrap()
        };
        assert_eq!(search(), search());
    }
}
