use crate::core::models::alignment::Alignment;
use crate::core::potentials::Potentials;
use crate::core::tree::Tree;
use crate::core::weighting::NeffEstimator;
use crate::engine::config::{
    ConfigError, MutationRate, NeffMatchingConfig, SamplingConfig, SamplingMode, SeedPolicy,
};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::{mcmc, neff_matching, tree_sampling};
use tracing::{info, instrument};

/// A generated alignment with its row identifiers and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub alignment: Alignment,
    pub ids: Vec<String>,
    /// Neff of `alignment` under the configured measure.
    pub neff: f64,
    /// Mutation rate used along the tree; `None` for MCMC runs.
    pub mutation_rate: Option<f64>,
    /// Whether the Neff search converged; `None` when no target was set.
    pub target_reached: Option<bool>,
}

enum Plan<'a> {
    Tree {
        tree: Tree,
        rate: f64,
        burn_in: usize,
    },
    MatchNeff {
        tree: Tree,
        target: f64,
        matching: NeffMatchingConfig,
        burn_in: usize,
    },
    Mcmc {
        size: usize,
        seeds: SeedPolicy,
        burn_in: usize,
        source: Option<&'a Alignment>,
    },
}

/// Generates a synthetic alignment from `potentials`.
///
/// `msa` is the (gap-filtered) source alignment. It seeds `original` and
/// `random-gapped` MCMC chains, supplies the leaf count of binary and star
/// trees built without one, and the default Neff target when matching Neff
/// along a tree. All inputs are validated before sampling starts.
///
/// # Errors
///
/// Returns [`EngineError`] for invalid configuration, malformed trees,
/// width mismatches, numerical failures and allocation failures. Failing to
/// reach a Neff target is reported through `target_reached`, not as an error.
#[instrument(skip_all, name = "generation_workflow")]
pub fn run(
    potentials: &Potentials,
    msa: Option<&Alignment>,
    config: &SamplingConfig,
    reporter: &ProgressReporter,
) -> Result<GenerationResult, EngineError> {
    // === Phase 0: Validation ===
    reporter.report(Progress::PhaseStart { name: "Validation" });
    let estimator = config.neff_measure.estimator()?;
    let plan = prepare(potentials, msa, config, estimator.as_ref())?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Sampling ===
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    let result = in_pool(config.threads, || {
        execute(potentials, plan, config, estimator.as_ref(), reporter)
    })?;
    reporter.report(Progress::PhaseFinish);

    info!(
        sequences = result.alignment.nrow(),
        columns = result.alignment.ncol(),
        neff = result.neff,
        "Generation complete."
    );
    Ok(result)
}

fn prepare<'a>(
    potentials: &Potentials,
    msa: Option<&'a Alignment>,
    config: &SamplingConfig,
    estimator: &dyn NeffEstimator,
) -> Result<Plan<'a>, EngineError> {
    if let Some(msa) = msa {
        if msa.ncol() != potentials.ncol() {
            return Err(EngineError::WidthMismatch {
                expected: potentials.ncol(),
                found: msa.ncol(),
            });
        }
    }

    match &config.mode {
        SamplingMode::Tree {
            source,
            rate,
            burn_in,
        } => {
            let default_leaves = msa.map(Alignment::nrow).filter(|&rows| rows > 0);
            let tree = source.build(default_leaves)?;
            let burn_in = *burn_in;
            match *rate {
                MutationRate::Constant(rate) => Ok(Plan::Tree {
                    tree,
                    rate,
                    burn_in,
                }),
                MutationRate::MatchNeff(matching) => {
                    let target = match (matching.target, msa) {
                        (Some(target), _) => target,
                        (None, Some(msa)) if msa.nrow() > 0 => estimator.estimate(msa),
                        (None, _) => return Err(ConfigError::MissingParameter("neff_target").into()),
                    };
                    if !target.is_finite() || target <= 0.0 {
                        return Err(ConfigError::InvalidValue {
                            parameter: "neff_target",
                            reason: format!("must be finite and positive, got {target}"),
                        }
                        .into());
                    }
                    info!(target, "Matching Neff along the tree.");
                    Ok(Plan::MatchNeff {
                        tree,
                        target,
                        matching,
                        burn_in,
                    })
                }
            }
        }
        SamplingMode::Mcmc {
            size,
            seeds,
            burn_in,
        } => {
            mcmc::validate_source(potentials, msa, *seeds)?;
            Ok(Plan::Mcmc {
                size: *size,
                seeds: *seeds,
                burn_in: *burn_in,
                source: msa,
            })
        }
    }
}

fn execute(
    potentials: &Potentials,
    plan: Plan<'_>,
    config: &SamplingConfig,
    estimator: &dyn NeffEstimator,
    reporter: &ProgressReporter,
) -> Result<GenerationResult, EngineError> {
    match plan {
        Plan::Tree {
            tree,
            rate,
            burn_in,
        } => {
            let sample = tree_sampling::run(potentials, &tree, rate, burn_in, config.seed, reporter)?;
            let neff = estimator.estimate(&sample.alignment);
            Ok(GenerationResult {
                alignment: sample.alignment,
                ids: sample.ids,
                neff,
                mutation_rate: Some(rate),
                target_reached: None,
            })
        }
        Plan::MatchNeff {
            tree,
            target,
            matching,
            burn_in,
        } => {
            let matched = neff_matching::run(
                potentials,
                &tree,
                burn_in,
                config.seed,
                target,
                &matching,
                estimator,
                reporter,
            )?;
            Ok(GenerationResult {
                alignment: matched.sample.alignment,
                ids: matched.sample.ids,
                neff: matched.neff,
                mutation_rate: Some(matched.mutation_rate),
                target_reached: Some(matched.target_reached),
            })
        }
        Plan::Mcmc {
            size,
            seeds,
            burn_in,
            source,
        } => {
            let sample = mcmc::run(
                potentials,
                source,
                seeds,
                size,
                burn_in,
                config.seed,
                reporter,
            )?;
            let neff = estimator.estimate(&sample.alignment);
            Ok(GenerationResult {
                alignment: sample.alignment,
                ids: sample.ids,
                neff,
                mutation_rate: None,
                target_reached: None,
            })
        }
    }
}

/// Runs `job` on a dedicated pool of `threads` workers, or on the current pool.
#[cfg(feature = "parallel")]
fn in_pool<T, F>(threads: Option<usize>, job: F) -> Result<T, EngineError>
where
    T: Send,
    F: FnOnce() -> Result<T, EngineError> + Send,
{
    match threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?
            .install(job),
        None => job(),
    }
}

#[cfg(not(feature = "parallel"))]
fn in_pool<T, F>(threads: Option<usize>, job: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError>,
{
    if let Some(threads) = threads {
        tracing::debug!(threads, "Built without the parallel feature; sampling sequentially.");
    }
    job()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::alphabet::AMINO_ACID_COUNT;
    use crate::core::potentials::tests::random_potentials;
    use crate::core::weighting::{EntropyNeff, WeightingPolicy};
    use crate::engine::config::{NeffMeasure, SamplingConfigBuilder, TreeSource};
    use std::sync::Mutex;

    fn source_alignment() -> Alignment {
        Alignment::from_sequences(&["ARNDCQ", "ARNECQ", "GHILKM", "GH-LKM", "FPSTWY"]).unwrap()
    }

    #[test]
    fn tree_mode_with_constant_rate_emits_one_row_per_leaf() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 41);
        let config = SamplingConfigBuilder::new()
            .tree(TreeSource::Binary { leaves: Some(12) })
            .mutation_rate(1.0)
            .burn_in(5)
            .seed(3)
            .build()
            .unwrap();
        let result = run(&potentials, None, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(result.alignment.nrow(), 12);
        assert_eq!(result.alignment.ncol(), 6);
        assert_eq!(result.ids.len(), 12);
        assert_eq!(result.mutation_rate, Some(1.0));
        assert_eq!(result.target_reached, None);
        assert_eq!(result.neff, EntropyNeff.estimate(&result.alignment));
    }

    #[test]
    fn match_neff_defaults_target_to_source_alignment_neff() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 42);
        let msa = source_alignment();
        let config = SamplingConfigBuilder::new()
            .tree(TreeSource::Star { leaves: Some(20) })
            .match_neff(NeffMatchingConfig {
                max_iterations: 8,
                ..NeffMatchingConfig::default()
            })
            .burn_in(3)
            .seed(5)
            .build()
            .unwrap();
        let result = run(&potentials, Some(&msa), &config, &ProgressReporter::new()).unwrap();

        assert_eq!(result.alignment.nrow(), 20);
        assert!(result.target_reached.is_some());
        assert!(result.mutation_rate.is_some_and(|rate| rate >= 0.0));
    }

    #[test]
    fn tree_without_leaf_count_takes_one_row_per_source_sequence() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 50);
        let msa = source_alignment();
        let config = SamplingConfigBuilder::new()
            .tree(TreeSource::Binary { leaves: None })
            .mutation_rate(0.5)
            .burn_in(2)
            .build()
            .unwrap();
        let result = run(&potentials, Some(&msa), &config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.alignment.nrow(), msa.nrow());

        let result = run(&potentials, None, &config, &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::MissingParameter("tree.leaves")))
        ));
    }

    #[test]
    fn tree_burn_in_only_affects_the_ancestor() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 51);
        let sample = |burn_in| {
            let config = SamplingConfigBuilder::new()
                .tree(TreeSource::Star { leaves: Some(3) })
                .mutation_rate(0.0)
                .burn_in(burn_in)
                .build()
                .unwrap();
            run(&potentials, None, &config, &ProgressReporter::new()).unwrap()
        };
        assert!(sample(0).alignment.as_slice().iter().all(|&code| code == 0));
        let burnt = sample(20);
        assert_eq!(burnt.alignment.row(0), burnt.alignment.row(2));
    }

    #[test]
    fn match_neff_without_target_or_alignment_is_a_config_error() {
        let potentials = random_potentials(4, AMINO_ACID_COUNT, 43);
        let config = SamplingConfigBuilder::new()
            .tree(TreeSource::Binary { leaves: Some(4) })
            .match_neff(NeffMatchingConfig::default())
            .build()
            .unwrap();
        let result = run(&potentials, None, &config, &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::MissingParameter("neff_target")))
        ));
    }

    #[test]
    fn mcmc_mode_with_zero_burn_in_returns_source_rows() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 44);
        let msa = source_alignment();
        let config = SamplingConfigBuilder::new()
            .mcmc(5, SeedPolicy::Original)
            .mcmc_burn_in(0)
            .build()
            .unwrap();
        let result = run(&potentials, Some(&msa), &config, &ProgressReporter::new()).unwrap();

        assert_eq!(result.alignment, msa);
        assert_eq!(result.ids, vec!["seq_0", "seq_1", "seq_2", "seq_3", "seq_4"]);
        assert_eq!(result.mutation_rate, None);
    }

    #[test]
    fn width_mismatch_is_rejected_before_sampling() {
        let potentials = random_potentials(5, AMINO_ACID_COUNT, 45);
        let msa = source_alignment();
        let config = SamplingConfigBuilder::new()
            .mcmc(5, SeedPolicy::Random)
            .build()
            .unwrap();
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));
        let result = run(&potentials, Some(&msa), &config, &reporter);
        drop(reporter);

        assert!(matches!(
            result,
            Err(EngineError::WidthMismatch {
                expected: 5,
                found: 6
            })
        ));
        assert!(
            !events
                .into_inner()
                .unwrap()
                .contains(&Progress::PhaseStart { name: "Sampling" })
        );
    }

    #[test]
    fn mcmc_original_seeds_without_alignment_are_rejected() {
        let potentials = random_potentials(5, AMINO_ACID_COUNT, 46);
        let config = SamplingConfigBuilder::new()
            .mcmc(5, SeedPolicy::Original)
            .build()
            .unwrap();
        let result = run(&potentials, None, &config, &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::MissingAlignment("original")))
        ));
    }

    #[test]
    fn malformed_tree_is_rejected_before_sampling() {
        let potentials = random_potentials(3, AMINO_ACID_COUNT, 47);
        let config = SamplingConfigBuilder::new()
            .tree(TreeSource::Nodes(Vec::new()))
            .mutation_rate(1.0)
            .build()
            .unwrap();
        let result = run(&potentials, None, &config, &ProgressReporter::new());
        assert!(matches!(result, Err(EngineError::Tree(_))));
    }

    #[test]
    fn weight_based_neff_measure_is_applied_to_output() {
        let potentials = random_potentials(4, AMINO_ACID_COUNT, 48);
        let config = SamplingConfigBuilder::new()
            .mcmc(9, SeedPolicy::Random)
            .mcmc_burn_in(2)
            .neff_measure(NeffMeasure::Weights {
                policy: WeightingPolicy::Uniform,
                count_gaps: false,
            })
            .build()
            .unwrap();
        let result = run(&potentials, None, &config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.neff, 9.0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn dedicated_thread_pool_gives_identical_output() {
        let potentials = random_potentials(6, AMINO_ACID_COUNT, 49);
        let builder = || {
            SamplingConfigBuilder::new()
                .tree(TreeSource::Binary { leaves: Some(24) })
                .mutation_rate(0.8)
                .burn_in(4)
                .seed(12)
        };
        let default_pool = run(
            &potentials,
            None,
            &builder().build().unwrap(),
            &ProgressReporter::new(),
        )
        .unwrap();
        let two_threads = run(
            &potentials,
            None,
            &builder().threads(2).build().unwrap(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(default_pool, two_threads);
    }
}
