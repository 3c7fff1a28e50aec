use super::allocate_codes;
use super::gibbs::sweep;
use crate::core::models::alignment::Alignment;
use crate::core::models::alphabet::GAP;
use crate::core::potentials::Potentials;
use crate::engine::config::{ConfigError, SeedPolicy};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::rng::stream_rng;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Independent Gibbs chains, one output row per chain.
#[derive(Debug, Clone, PartialEq)]
pub struct McmcSample {
    pub alignment: Alignment,
    pub ids: Vec<String>,
}

/// Checks that `source` can seed chains under `policy` for these potentials.
pub fn validate_source(
    potentials: &Potentials,
    source: Option<&Alignment>,
    policy: SeedPolicy,
) -> Result<(), EngineError> {
    if let Some(msa) = source {
        if msa.ncol() != potentials.ncol() {
            return Err(EngineError::WidthMismatch {
                expected: potentials.ncol(),
                found: msa.ncol(),
            });
        }
    }
    if policy.needs_alignment() && source.is_none_or(|msa| msa.nrow() == 0) {
        return Err(ConfigError::MissingAlignment(policy.name()).into());
    }
    Ok(())
}

fn initial_sequence(
    potentials: &Potentials,
    source: Option<&Alignment>,
    policy: SeedPolicy,
    chain: usize,
    rng: &mut StdRng,
) -> Result<Vec<u8>, EngineError> {
    let states = potentials.field_states() as u8;
    let template = || {
        source
            .map(|msa| msa.row(chain % msa.nrow()))
            .ok_or_else(|| EngineError::from(ConfigError::MissingAlignment(policy.name())))
    };
    let mut sequence = allocate_codes(1, potentials.ncol())?;
    match policy {
        SeedPolicy::Original => sequence.copy_from_slice(template()?),
        SeedPolicy::Random => {
            for code in sequence.iter_mut() {
                *code = rng.gen_range(0..states);
            }
        }
        SeedPolicy::RandomGapped => {
            for (code, &original) in sequence.iter_mut().zip(template()?) {
                *code = if original == GAP {
                    GAP
                } else {
                    rng.gen_range(0..states)
                };
            }
        }
    }
    Ok(sequence)
}

/// Initial sequences of all chains, exactly as [`run`] starts them.
pub fn seed_pool(
    potentials: &Potentials,
    source: Option<&Alignment>,
    policy: SeedPolicy,
    size: usize,
    seed: u64,
) -> Result<Alignment, EngineError> {
    validate_source(potentials, source, policy)?;
    let ncol = potentials.ncol();
    let mut data = allocate_codes(size, ncol)?;
    for (chain, row) in data.chunks_mut(ncol.max(1)).enumerate() {
        let mut rng = stream_rng(seed, chain as u64);
        row.copy_from_slice(&initial_sequence(potentials, source, policy, chain, &mut rng)?);
    }
    Ok(Alignment::from_raw(size, ncol, data)?)
}

#[instrument(skip_all, name = "mcmc_task")]
pub fn run(
    potentials: &Potentials,
    source: Option<&Alignment>,
    policy: SeedPolicy,
    size: usize,
    burn_in: usize,
    seed: u64,
    reporter: &ProgressReporter,
) -> Result<McmcSample, EngineError> {
    validate_source(potentials, source, policy)?;
    let ncol = potentials.ncol();
    info!(chains = size, burn_in, seeds = policy.name(), "Running MCMC chains.");

    let mut data = allocate_codes(size, ncol)?;
    reporter.report(Progress::TaskStart {
        total_steps: size as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let mut iterator = data.chunks_mut(ncol.max(1)).enumerate();

    #[cfg(feature = "parallel")]
    let iterator = data.par_chunks_mut(ncol.max(1)).enumerate();

    iterator.try_for_each(|(chain, row)| -> Result<(), EngineError> {
        let mut rng = stream_rng(seed, chain as u64);
        let sequence = initial_sequence(potentials, source, policy, chain, &mut rng)?;
        row.copy_from_slice(&sequence);
        for _ in 0..burn_in {
            sweep(potentials, row, chain, &mut rng)?;
        }
        reporter.report(Progress::TaskIncrement);
        Ok(())
    })?;

    reporter.report(Progress::TaskFinish);

    let alignment = Alignment::from_raw(size, ncol, data)?;
    let ids = (0..size).map(|i| format!("seq_{i}")).collect();
    Ok(McmcSample { alignment, ids })
}
