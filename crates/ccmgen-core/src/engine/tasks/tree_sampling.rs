use super::allocate_codes;
use super::gibbs::{mutate_branch, mutation_probability, sweep};
use crate::core::models::alignment::Alignment;
use crate::core::potentials::Potentials;
use crate::core::tree::Tree;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::rng::{ANCESTOR_STREAM, stream_rng};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Leaves sampled along a tree, in the tree's leaf order.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSample {
    pub alignment: Alignment,
    pub ids: Vec<String>,
    pub ancestor: Vec<u8>,
}

/// Samples the root sequence: the all-`A` sequence after `burn_in` Gibbs sweeps.
#[instrument(skip_all, name = "ancestor_sampling")]
pub fn sample_ancestor(
    potentials: &Potentials,
    burn_in: usize,
    seed: u64,
    sequence_index: usize,
) -> Result<Vec<u8>, EngineError> {
    let mut ancestor = allocate_codes(1, potentials.ncol())?;
    let mut rng = stream_rng(seed, ANCESTOR_STREAM);
    for _ in 0..burn_in {
        sweep(potentials, &mut ancestor, sequence_index, &mut rng)?;
    }
    debug!(burn_in, "Ancestral sequence sampled.");
    Ok(ancestor)
}

#[instrument(skip_all, name = "tree_sampling_task")]
pub fn run(
    potentials: &Potentials,
    tree: &Tree,
    mutation_rate: f64,
    burn_in: usize,
    seed: u64,
    reporter: &ProgressReporter,
) -> Result<TreeSample, EngineError> {
    let ancestor = sample_ancestor(potentials, burn_in, seed, tree.root())?;
    propagate(potentials, tree, &ancestor, mutation_rate, seed, reporter)
}

/// Evolves `ancestor` down every branch of `tree`.
///
/// Nodes of one depth level are derived concurrently. The edge into node `n`
/// draws from substream `n` of `seed`, so the output does not depend on the
/// number of worker threads.
pub fn propagate(
    potentials: &Potentials,
    tree: &Tree,
    ancestor: &[u8],
    mutation_rate: f64,
    seed: u64,
    reporter: &ProgressReporter,
) -> Result<TreeSample, EngineError> {
    let ncol = potentials.ncol();
    if ancestor.len() != ncol {
        return Err(EngineError::WidthMismatch {
            expected: ncol,
            found: ancestor.len(),
        });
    }
    info!(
        leaves = tree.leaf_count(),
        nodes = tree.len(),
        mutation_rate,
        "Sampling sequences along the tree."
    );

    let mut leaf_row = vec![None; tree.len()];
    for (row, &leaf) in tree.leaves().iter().enumerate() {
        leaf_row[leaf] = Some(row);
    }
    let mut data = allocate_codes(tree.leaf_count(), ncol)?;
    let mut store = |node: usize, sequence: &[u8]| {
        if let Some(row) = leaf_row[node] {
            data[row * ncol..(row + 1) * ncol].copy_from_slice(sequence);
        }
    };

    reporter.report(Progress::TaskStart {
        total_steps: tree.len().saturating_sub(1) as u64,
    });

    let levels = tree.levels();
    let mut sequences: Vec<Option<Vec<u8>>> = vec![None; tree.len()];
    store(tree.root(), ancestor);
    sequences[tree.root()] = Some(ancestor.to_vec());

    for depth in 1..levels.len() {
        let level = &levels[depth];
        let derived: Vec<Vec<u8>> = {
            let sequences = &sequences;

            #[cfg(not(feature = "parallel"))]
            let iterator = level.iter();

            #[cfg(feature = "parallel")]
            let iterator = level.par_iter();

            iterator
                .map(|&child| -> Result<Vec<u8>, EngineError> {
                    let node = tree.node(child);
                    let parent = node
                        .parent
                        .and_then(|parent| sequences[parent].as_deref())
                        .ok_or_else(|| {
                            EngineError::Internal(format!("node {child} reached before its parent"))
                        })?;
                    let mut rng = stream_rng(seed, child as u64);
                    let mut sequence = allocate_codes(1, ncol)?;
                    let p_mut = mutation_probability(mutation_rate, node.branch_length);
                    mutate_branch(potentials, parent, &mut sequence, p_mut, child, &mut rng)?;
                    reporter.report(Progress::TaskIncrement);
                    Ok(sequence)
                })
                .collect::<Result<_, EngineError>>()?
        };

        for &parent in &levels[depth - 1] {
            sequences[parent] = None;
        }
        for (&node, sequence) in level.iter().zip(derived) {
            store(node, &sequence);
            if !tree.node(node).is_leaf() {
                sequences[node] = Some(sequence);
            }
        }
    }

    reporter.report(Progress::TaskFinish);

    let alignment = Alignment::from_raw(tree.leaf_count(), ncol, data)?;
    Ok(TreeSample {
        alignment,
        ids: tree.leaf_ids(),
        ancestor: ancestor.to_vec(),
    })
}
