use super::alphabet::{self, ALPHABET_SIZE, GAP};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("Row {row} has length {found}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Invalid state code {code} at row {row}, column {column}")]
    InvalidCode { row: usize, column: usize, code: u8 },
    #[error("Buffer of {len} codes does not match a {nrow}x{ncol} alignment")]
    ShapeMismatch { nrow: usize, ncol: usize, len: usize },
    #[error("Could not allocate an alignment of {nrow}x{ncol} codes")]
    Allocation { nrow: usize, ncol: usize },
}

/// An integer-coded multiple sequence alignment stored row-major.
///
/// Every code is guaranteed to lie in `[0, ALPHABET_SIZE)`; constructors
/// validate their input so that downstream sampling and weighting code can
/// index potentials and count tables without further checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alignment {
    nrow: usize,
    ncol: usize,
    data: Vec<u8>,
}

impl Alignment {
    /// Creates an alignment filled with code 0.
    ///
    /// The buffer is reserved fallibly so that oversized requests surface as
    /// [`AlignmentError::Allocation`] instead of aborting the process.
    pub fn zeros(nrow: usize, ncol: usize) -> Result<Self, AlignmentError> {
        Self::filled(nrow, ncol, 0)
    }

    pub fn filled(nrow: usize, ncol: usize, code: u8) -> Result<Self, AlignmentError> {
        let len = nrow
            .checked_mul(ncol)
            .ok_or(AlignmentError::Allocation { nrow, ncol })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| AlignmentError::Allocation { nrow, ncol })?;
        data.resize(len, code);
        Self::from_raw(nrow, ncol, data)
    }

    /// Builds an alignment from a flat row-major buffer.
    pub fn from_raw(nrow: usize, ncol: usize, data: Vec<u8>) -> Result<Self, AlignmentError> {
        if nrow.checked_mul(ncol) != Some(data.len()) {
            return Err(AlignmentError::ShapeMismatch {
                nrow,
                ncol,
                len: data.len(),
            });
        }
        if let Some(pos) = data.iter().position(|&c| c as usize >= ALPHABET_SIZE) {
            return Err(AlignmentError::InvalidCode {
                row: pos / ncol,
                column: pos % ncol,
                code: data[pos],
            });
        }
        Ok(Self { nrow, ncol, data })
    }

    /// Builds an alignment from equally long rows of codes.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, AlignmentError> {
        let ncol = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * ncol);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != ncol {
                return Err(AlignmentError::RaggedRow {
                    row: i,
                    expected: ncol,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::from_raw(rows.len(), ncol, data)
    }

    /// Encodes one-letter sequences (see [`alphabet::encode`]).
    pub fn from_sequences<S: AsRef<str>>(sequences: &[S]) -> Result<Self, AlignmentError> {
        let rows: Vec<Vec<u8>> = sequences
            .iter()
            .map(|s| alphabet::encode_str(s.as_ref()))
            .collect();
        Self::from_rows(&rows)
    }

    #[inline]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn is_empty(&self) -> bool {
        self.nrow == 0
    }

    #[inline]
    pub fn get(&self, row: usize, column: usize) -> u8 {
        self.data[row * self.ncol + column]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[row * self.ncol..(row + 1) * self.ncol]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        &mut self.data[row * self.ncol..(row + 1) * self.ncol]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        (0..self.nrow).map(move |i| self.row(i))
    }

    pub fn column(&self, column: usize) -> impl Iterator<Item = u8> + '_ {
        self.rows().map(move |row| row[column])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn gap_count(&self) -> usize {
        self.data.iter().filter(|&&c| c == GAP).count()
    }

    /// Renders each row as a one-letter string.
    pub fn to_sequences(&self) -> Vec<String> {
        self.rows().map(alphabet::decode_codes).collect()
    }
}
