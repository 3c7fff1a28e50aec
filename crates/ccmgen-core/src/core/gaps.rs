use super::models::alignment::{Alignment, AlignmentError};
use super::models::alphabet::GAP;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GapError {
    #[error("Gap percentage threshold must lie within [0, 100], got {0}")]
    InvalidThreshold(f64),
    #[error("Cannot reinsert columns: {removed} removed plus {kept} kept != {original} original")]
    ColumnCountMismatch {
        removed: usize,
        kept: usize,
        original: usize,
    },
    #[error("Removed column index {0} lies outside the original alignment")]
    ColumnOutOfRange(usize),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

/// An alignment with its gappy columns removed, plus the original indices of
/// the removed columns for later reinsertion.
#[derive(Debug, Clone, PartialEq)]
pub struct GapFilter {
    pub alignment: Alignment,
    pub removed_columns: Vec<usize>,
    pub original_ncol: usize,
}

impl GapFilter {
    pub fn has_removed_columns(&self) -> bool {
        !self.removed_columns.is_empty()
    }
}

fn check_threshold(percent: f64) -> Result<(), GapError> {
    if (0.0..=100.0).contains(&percent) {
        Ok(())
    } else {
        Err(GapError::InvalidThreshold(percent))
    }
}

fn gap_percent(gaps: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * gaps as f64 / total as f64
    }
}

/// Removes rows with more than `max_gap_seq_percent` percent gaps.
///
/// Returns the filtered alignment and the indices of the rows that were kept.
pub fn remove_gapped_sequences(
    msa: &Alignment,
    max_gap_seq_percent: f64,
) -> Result<(Alignment, Vec<usize>), GapError> {
    check_threshold(max_gap_seq_percent)?;
    let kept: Vec<usize> = msa
        .rows()
        .enumerate()
        .filter(|(_, row)| {
            let gaps = row.iter().filter(|&&c| c == GAP).count();
            gap_percent(gaps, row.len()) <= max_gap_seq_percent
        })
        .map(|(i, _)| i)
        .collect();
    let rows: Vec<&[u8]> = kept.iter().map(|&i| msa.row(i)).collect();
    let filtered = if rows.is_empty() {
        Alignment::zeros(0, msa.ncol())?
    } else {
        Alignment::from_rows(&rows)?
    };
    Ok((filtered, kept))
}

/// Removes columns with more than `max_gap_pos_percent` percent gaps.
pub fn remove_gapped_positions(
    msa: &Alignment,
    max_gap_pos_percent: f64,
) -> Result<GapFilter, GapError> {
    check_threshold(max_gap_pos_percent)?;
    let (kept, removed): (Vec<usize>, Vec<usize>) = (0..msa.ncol()).partition(|&column| {
        let gaps = msa.column(column).filter(|&c| c == GAP).count();
        gap_percent(gaps, msa.nrow()) <= max_gap_pos_percent
    });

    let mut data = Vec::with_capacity(msa.nrow() * kept.len());
    for row in msa.rows() {
        data.extend(kept.iter().map(|&column| row[column]));
    }
    Ok(GapFilter {
        alignment: Alignment::from_raw(msa.nrow(), kept.len(), data)?,
        removed_columns: removed,
        original_ncol: msa.ncol(),
    })
}

/// Rebuilds a full-width alignment by inserting gap-only columns at the
/// original indices in `removed_columns`.
pub fn backinsert_gapped_positions(
    msa: &Alignment,
    removed_columns: &[usize],
    original_ncol: usize,
) -> Result<Alignment, GapError> {
    if removed_columns.len() + msa.ncol() != original_ncol {
        return Err(GapError::ColumnCountMismatch {
            removed: removed_columns.len(),
            kept: msa.ncol(),
            original: original_ncol,
        });
    }
    let mut is_removed = vec![false; original_ncol];
    for &column in removed_columns {
        if column >= original_ncol {
            return Err(GapError::ColumnOutOfRange(column));
        }
        is_removed[column] = true;
    }

    let mut full = Alignment::filled(msa.nrow(), original_ncol, GAP)?;
    for (i, row) in msa.rows().enumerate() {
        let target = full.row_mut(i);
        let mut source = row.iter();
        for (slot, _) in target.iter_mut().zip(&is_removed).filter(|(_, removed)| !**removed) {
            if let Some(&code) = source.next() {
                *slot = code;
            }
        }
    }
    Ok(full)
}
