use super::error::EngineError;
use crate::core::tree::{NodeSpec, Tree};
use crate::core::weighting::{EntropyNeff, NeffEstimator, WeightSumNeff, WeightingError, WeightingPolicy};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BURN_IN: usize = 500;
pub const DEFAULT_MCMC_SIZE: usize = 10_000;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Conflicting options: {0}")]
    Conflict(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("Seed policy '{0}' requires a non-empty source alignment")]
    MissingAlignment(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid sampling configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Where the tree for a tree-guided run comes from.
///
/// Synthesised shapes without a leaf count take one from the caller, usually
/// the number of sequences in the source alignment.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeSource {
    Binary { leaves: Option<usize> },
    Star { leaves: Option<usize> },
    Nodes(Vec<NodeSpec>),
}

impl TreeSource {
    pub fn build(&self, default_leaves: Option<usize>) -> Result<Tree, EngineError> {
        let leaves = |requested: Option<usize>| {
            requested
                .or(default_leaves)
                .ok_or(ConfigError::MissingParameter("tree.leaves"))
        };
        Ok(match self {
            TreeSource::Binary { leaves: n } => Tree::binary(leaves(*n)?)?,
            TreeSource::Star { leaves: n } => Tree::star(leaves(*n)?)?,
            TreeSource::Nodes(specs) => Tree::from_nodes(specs)?,
        })
    }
}

/// Parameters of the rate search that matches a target Neff.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeffMatchingConfig {
    /// Target Neff. When absent, the Neff of the source alignment is used.
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default = "default_initial_rate")]
    pub initial_rate: f64,
    #[serde(default = "default_growth")]
    pub growth: f64,
    #[serde(default = "default_rel_tolerance")]
    pub rel_tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_initial_rate() -> f64 {
    1.0
}
fn default_growth() -> f64 {
    2.0
}
fn default_rel_tolerance() -> f64 {
    0.02
}
fn default_max_iterations() -> usize {
    30
}

impl Default for NeffMatchingConfig {
    fn default() -> Self {
        Self {
            target: None,
            initial_rate: default_initial_rate(),
            growth: default_growth(),
            rel_tolerance: default_rel_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl NeffMatchingConfig {
    pub fn with_target(target: f64) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(target) = self.target {
            positive_finite("neff_target", target)?;
        }
        positive_finite("initial_rate", self.initial_rate)?;
        if !self.growth.is_finite() || self.growth <= 1.0 {
            return Err(invalid("growth", format!("must exceed 1, got {}", self.growth)));
        }
        if !(self.rel_tolerance > 0.0 && self.rel_tolerance < 1.0) {
            return Err(invalid(
                "rel_tolerance",
                format!("must lie in (0, 1), got {}", self.rel_tolerance),
            ));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MutationRate {
    Constant(f64),
    MatchNeff(NeffMatchingConfig),
}

/// Initial sequences of the MCMC chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedPolicy {
    /// Rows of the source alignment, reused cyclically.
    #[default]
    Original,
    /// Uniformly random states.
    Random,
    /// Uniformly random states keeping the gap pattern of the source rows.
    RandomGapped,
}

impl SeedPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SeedPolicy::Original => "original",
            SeedPolicy::Random => "random",
            SeedPolicy::RandomGapped => "random-gapped",
        }
    }

    pub fn needs_alignment(&self) -> bool {
        !matches!(self, SeedPolicy::Random)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplingMode {
    Tree {
        source: TreeSource,
        rate: MutationRate,
        /// Full Gibbs sweeps applied to the root ancestor.
        burn_in: usize,
    },
    Mcmc {
        size: usize,
        seeds: SeedPolicy,
        /// Full Gibbs sweeps applied to every chain.
        burn_in: usize,
    },
}

/// How the Neff of generated alignments is measured.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NeffMeasure {
    #[default]
    Entropy,
    Weights {
        #[serde(default)]
        policy: WeightingPolicy,
        #[serde(default)]
        count_gaps: bool,
    },
}

impl NeffMeasure {
    pub fn estimator(&self) -> Result<Box<dyn NeffEstimator>, WeightingError> {
        Ok(match *self {
            NeffMeasure::Entropy => Box::new(EntropyNeff),
            NeffMeasure::Weights { policy, count_gaps } => {
                Box::new(WeightSumNeff::new(policy, count_gaps)?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub mode: SamplingMode,
    pub seed: u64,
    /// Worker threads for this run; `None` uses rayon's default pool.
    pub threads: Option<usize>,
    pub neff_measure: NeffMeasure,
}

impl SamplingConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        let file: SamplingFile = toml::from_str(content)?;
        Ok(file.into_config()?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }
}

#[derive(Default)]
pub struct SamplingConfigBuilder {
    tree: Option<TreeSource>,
    mutation_rate: Option<f64>,
    match_neff: Option<NeffMatchingConfig>,
    mcmc: Option<(usize, SeedPolicy)>,
    burn_in: Option<usize>,
    mcmc_burn_in: Option<usize>,
    seed: Option<u64>,
    threads: Option<usize>,
    neff_measure: Option<NeffMeasure>,
}

impl SamplingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(mut self, source: TreeSource) -> Self {
        self.tree = Some(source);
        self
    }
    pub fn mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = Some(rate);
        self
    }
    pub fn match_neff(mut self, matching: NeffMatchingConfig) -> Self {
        self.match_neff = Some(matching);
        self
    }
    pub fn mcmc(mut self, size: usize, seeds: SeedPolicy) -> Self {
        self.mcmc = Some((size, seeds));
        self
    }
    /// Sweeps for the root ancestor of a tree-guided run.
    pub fn burn_in(mut self, sweeps: usize) -> Self {
        self.burn_in = Some(sweeps);
        self
    }
    /// Sweeps for every MCMC chain.
    pub fn mcmc_burn_in(mut self, sweeps: usize) -> Self {
        self.mcmc_burn_in = Some(sweeps);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
    pub fn neff_measure(mut self, measure: NeffMeasure) -> Self {
        self.neff_measure = Some(measure);
        self
    }

    pub fn build(self) -> Result<SamplingConfig, ConfigError> {
        let has_rate = self.mutation_rate.is_some() || self.match_neff.is_some();
        let mode = match (self.tree, self.mcmc) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict(
                    "tree-guided sampling and MCMC sampling are mutually exclusive",
                ));
            }
            (None, None) => return Err(ConfigError::MissingParameter("sampling_mode")),
            (None, Some(_)) if has_rate => {
                return Err(ConfigError::Conflict(
                    "a mutation rate only applies to tree-guided sampling",
                ));
            }
            (None, Some(_)) if self.burn_in.is_some() => {
                return Err(ConfigError::Conflict(
                    "the ancestor burn-in only applies to tree-guided sampling; use the MCMC burn-in",
                ));
            }
            (None, Some((size, seeds))) => {
                if size == 0 {
                    return Err(invalid("mcmc_size", "must be at least 1".to_string()));
                }
                SamplingMode::Mcmc {
                    size,
                    seeds,
                    burn_in: self.mcmc_burn_in.unwrap_or(DEFAULT_BURN_IN),
                }
            }
            (Some(_), None) if self.mcmc_burn_in.is_some() => {
                return Err(ConfigError::Conflict(
                    "the MCMC burn-in only applies to MCMC sampling",
                ));
            }
            (Some(source), None) => {
                let rate = match (self.mutation_rate, self.match_neff) {
                    (Some(_), Some(_)) => {
                        return Err(ConfigError::Conflict(
                            "a constant mutation rate and Neff matching are mutually exclusive",
                        ));
                    }
                    (None, None) => return Err(ConfigError::MissingParameter("mutation_rate")),
                    (Some(rate), None) => {
                        if !rate.is_finite() || rate < 0.0 {
                            return Err(invalid(
                                "mutation_rate",
                                format!("must be finite and non-negative, got {rate}"),
                            ));
                        }
                        MutationRate::Constant(rate)
                    }
                    (None, Some(matching)) => {
                        matching.validate()?;
                        MutationRate::MatchNeff(matching)
                    }
                };
                if let TreeSource::Binary { leaves: Some(0) } | TreeSource::Star { leaves: Some(0) } =
                    &source
                {
                    return Err(invalid("leaves", "must be at least 1".to_string()));
                }
                SamplingMode::Tree {
                    source,
                    rate,
                    burn_in: self.burn_in.unwrap_or(DEFAULT_BURN_IN),
                }
            }
        };

        if self.threads == Some(0) {
            return Err(invalid("threads", "must be at least 1".to_string()));
        }
        let neff_measure = self.neff_measure.unwrap_or_default();
        if let NeffMeasure::Weights { policy, .. } = neff_measure {
            policy
                .validate()
                .map_err(|e| invalid("neff_measure", e.to_string()))?;
        }

        Ok(SamplingConfig {
            mode,
            seed: self.seed.unwrap_or(0),
            threads: self.threads,
            neff_measure,
        })
    }
}

fn invalid(parameter: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidValue { parameter, reason }
}

fn positive_finite(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, format!("must be finite and positive, got {value}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SamplingFile {
    seed: Option<u64>,
    threads: Option<usize>,
    neff: Option<NeffMeasure>,
    tree: Option<TreeSection>,
    mcmc: Option<McmcSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum TreeShape {
    Binary,
    Star,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeSection {
    shape: Option<TreeShape>,
    leaves: Option<usize>,
    nodes: Option<Vec<NodeSpec>>,
    burn_in: Option<usize>,
    mutation_rate: Option<f64>,
    match_neff: Option<NeffMatchingConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McmcSection {
    #[serde(default = "default_mcmc_size")]
    size: usize,
    #[serde(default)]
    seeds: SeedPolicy,
    burn_in: Option<usize>,
}

fn default_mcmc_size() -> usize {
    DEFAULT_MCMC_SIZE
}

impl SamplingFile {
    fn into_config(self) -> Result<SamplingConfig, ConfigError> {
        let mut builder = SamplingConfigBuilder::new();
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        if let Some(threads) = self.threads {
            builder = builder.threads(threads);
        }
        if let Some(measure) = self.neff {
            builder = builder.neff_measure(measure);
        }
        if let Some(mcmc) = self.mcmc {
            builder = builder.mcmc(mcmc.size, mcmc.seeds);
            if let Some(burn_in) = mcmc.burn_in {
                builder = builder.mcmc_burn_in(burn_in);
            }
        }
        if let Some(tree) = self.tree {
            let source = match (tree.shape, tree.leaves, tree.nodes) {
                (Some(_), _, Some(_)) => {
                    return Err(ConfigError::Conflict(
                        "a tree is given either by shape or by an explicit node list",
                    ));
                }
                (Some(TreeShape::Binary), leaves, None) => TreeSource::Binary { leaves },
                (Some(TreeShape::Star), leaves, None) => TreeSource::Star { leaves },
                (None, Some(_), Some(_)) => {
                    return Err(ConfigError::Conflict(
                        "an explicit node list fixes the leaf count",
                    ));
                }
                (None, None, Some(nodes)) => TreeSource::Nodes(nodes),
                (None, _, None) => return Err(ConfigError::MissingParameter("tree.shape")),
            };
            builder = builder.tree(source);
            if let Some(burn_in) = tree.burn_in {
                builder = builder.burn_in(burn_in);
            }
            if let Some(rate) = tree.mutation_rate {
                builder = builder.mutation_rate(rate);
            }
            if let Some(matching) = tree.match_neff {
                builder = builder.match_neff(matching);
            }
        }
        builder.build()
    }
}
