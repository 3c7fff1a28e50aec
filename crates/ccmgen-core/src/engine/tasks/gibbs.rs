use crate::core::models::alphabet::{ALPHABET_SIZE, GAP};
use crate::core::potentials::Potentials;
use crate::engine::error::EngineError;
use crate::engine::utils::sampling::{SamplingError, draw_state};
use rand::Rng;

/// Fills `scores[..S]` with the conditional log-probabilities of every sampled
/// state at `column`, given the rest of `sequence`.
pub fn conditional_scores(
    potentials: &Potentials,
    sequence: &[u8],
    column: usize,
    scores: &mut [f64],
) {
    let states = potentials.field_states();
    scores[..states].copy_from_slice(potentials.field_row(column));
    for (j, &state_j) in sequence.iter().enumerate() {
        if j == column {
            continue;
        }
        let block = potentials.pair_block(column, j);
        let b = state_j as usize;
        for (a, score) in scores[..states].iter_mut().enumerate() {
            *score += block[a * ALPHABET_SIZE + b];
        }
    }
}

/// Resamples `sequence[column]` from its conditional distribution.
///
/// A gap stays untouched when the potentials carry no gap state, and no
/// random number is consumed in that case.
pub fn gibbs_step(
    potentials: &Potentials,
    sequence: &mut [u8],
    column: usize,
    rng: &mut impl Rng,
) -> Result<(), SamplingError> {
    if !potentials.has_gap_state() && sequence[column] == GAP {
        return Ok(());
    }
    let mut scores = [0.0; ALPHABET_SIZE];
    conditional_scores(potentials, sequence, column, &mut scores);
    let state = draw_state(&mut scores[..potentials.field_states()], rng)?;
    sequence[column] = state as u8;
    Ok(())
}

/// One full Gibbs sweep over columns `0..L` in ascending order.
///
/// `sequence_index` only labels numerical errors.
pub fn sweep(
    potentials: &Potentials,
    sequence: &mut [u8],
    sequence_index: usize,
    rng: &mut impl Rng,
) -> Result<(), EngineError> {
    for column in 0..sequence.len() {
        gibbs_step(potentials, sequence, column, rng).map_err(|source| {
            EngineError::Numerical {
                sequence: sequence_index,
                column,
                source,
            }
        })?;
    }
    Ok(())
}

/// Probability that a site mutates along a branch: `1 - exp(-rate * length)`.
pub fn mutation_probability(rate: f64, branch_length: f64) -> f64 {
    let exposure = rate * branch_length;
    if exposure.is_nan() || exposure <= 0.0 {
        0.0
    } else if exposure.is_infinite() {
        1.0
    } else {
        (1.0 - (-exposure).exp()).clamp(0.0, 1.0)
    }
}

/// Derives `child` from `parent` along one branch.
///
/// The child starts as a copy of the parent. For each column in ascending
/// order one uniform number decides whether the site mutates; mutating sites
/// are resampled with a Gibbs step against the child's current state.
pub fn mutate_branch(
    potentials: &Potentials,
    parent: &[u8],
    child: &mut [u8],
    mutation_probability: f64,
    sequence_index: usize,
    rng: &mut impl Rng,
) -> Result<(), EngineError> {
    child.copy_from_slice(parent);
    for column in 0..child.len() {
        let u: f64 = rng.r#gen();
        if u < mutation_probability {
            gibbs_step(potentials, child, column, rng).map_err(|source| {
                EngineError::Numerical {
                    sequence: sequence_index,
                    column,
                    source,
                }
            })?;
        }
    }
    Ok(())
}
