use super::models::alphabet::{ALPHABET_SIZE, AMINO_ACID_COUNT};
use itertools::Itertools;
use thiserror::Error;

const SYMMETRY_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Error, PartialEq)]
pub enum PotentialsError {
    #[error("Single-site fields must cover 20 or 21 states, got {0}")]
    InvalidFieldStates(usize),
    #[error("Single-site field tensor has {found} values, expected {expected}")]
    FieldShape { expected: usize, found: usize },
    #[error("Pair coupling tensor has {found} values, expected {expected}")]
    PairShape { expected: usize, found: usize },
    #[error("Linear parameter vector has {found} values, expected {expected}")]
    LinearShape { expected: usize, found: usize },
    #[error("Non-finite potential value at parameter index {index}")]
    NonFinite { index: usize },
    #[error("Column {column} has a non-zero self-coupling")]
    SelfCoupling { column: usize },
    #[error("Couplings are not symmetric: pair[{i},{j},{a},{b}] != pair[{j},{i},{b},{a}]")]
    Asymmetric {
        i: usize,
        j: usize,
        a: usize,
        b: usize,
    },
    #[error("Contact mask covers {found} columns but the potentials cover {expected}")]
    ContactMaskShape { expected: usize, found: usize },
    #[error("Contact ({i}, {j}) lies outside a mask of {ncol} columns")]
    ContactOutOfRange { i: usize, j: usize, ncol: usize },
}

/// Single-site fields and pairwise couplings of a fitted MRF.
///
/// Both tensors live in one flat parameter vector: first the field block of
/// shape `L x S` (S = 20 for the "no gap state" variant, 21 otherwise), then the
/// coupling block of shape `L x L x A x A` with `A = 21`. The layout matches the
/// linearised parameter vector produced by the training code, so a trained
/// vector can be handed over unchanged through [`Potentials::from_linear`].
///
/// Construction validates that every value is finite, that self-couplings are
/// zero and that `pair[i,j,a,b] == pair[j,i,b,a]`. The struct is immutable
/// afterwards except for [`Potentials::mask_non_contacts`], which preserves
/// all three invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct Potentials {
    ncol: usize,
    field_states: usize,
    params: Vec<f64>,
}

impl Potentials {
    pub fn new(
        ncol: usize,
        field_states: usize,
        field: Vec<f64>,
        pair: Vec<f64>,
    ) -> Result<Self, PotentialsError> {
        check_field_states(field_states)?;
        let field_len = ncol * field_states;
        let pair_len = pair_block_len(ncol);
        if field.len() != field_len {
            return Err(PotentialsError::FieldShape {
                expected: field_len,
                found: field.len(),
            });
        }
        if pair.len() != pair_len {
            return Err(PotentialsError::PairShape {
                expected: pair_len,
                found: pair.len(),
            });
        }

        let mut params = field;
        params.extend(pair);
        let potentials = Self {
            ncol,
            field_states,
            params,
        };
        potentials.validate()?;
        Ok(potentials)
    }

    /// Wraps an already linearised parameter vector.
    pub fn from_linear(
        ncol: usize,
        field_states: usize,
        params: Vec<f64>,
    ) -> Result<Self, PotentialsError> {
        check_field_states(field_states)?;
        let expected = ncol * field_states + pair_block_len(ncol);
        if params.len() != expected {
            return Err(PotentialsError::LinearShape {
                expected,
                found: params.len(),
            });
        }
        let potentials = Self {
            ncol,
            field_states,
            params,
        };
        potentials.validate()?;
        Ok(potentials)
    }

    /// Potentials with the given fields and no couplings (an independent-site model).
    pub fn independent(
        ncol: usize,
        field_states: usize,
        field: Vec<f64>,
    ) -> Result<Self, PotentialsError> {
        Self::new(ncol, field_states, field, vec![0.0; pair_block_len(ncol)])
    }

    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Number of states the single-site fields cover, and therefore the
    /// number of states a Gibbs step chooses from.
    #[inline]
    pub fn field_states(&self) -> usize {
        self.field_states
    }

    #[inline]
    pub fn has_gap_state(&self) -> bool {
        self.field_states == ALPHABET_SIZE
    }

    pub fn as_linear(&self) -> &[f64] {
        &self.params
    }

    #[inline]
    pub fn field_row(&self, column: usize) -> &[f64] {
        let start = column * self.field_states;
        &self.params[start..start + self.field_states]
    }

    #[inline]
    pub fn field(&self, column: usize, state: usize) -> f64 {
        self.params[column * self.field_states + state]
    }

    /// The `A x A` coupling block between columns `i` and `j`, indexed `a * A + b`.
    #[inline]
    pub fn pair_block(&self, i: usize, j: usize) -> &[f64] {
        let start = self.pair_offset(i, j);
        &self.params[start..start + ALPHABET_SIZE * ALPHABET_SIZE]
    }

    #[inline]
    pub fn pair(&self, i: usize, j: usize, a: usize, b: usize) -> f64 {
        self.params[self.pair_offset(i, j) + a * ALPHABET_SIZE + b]
    }

    /// Sets the couplings of every non-contact column pair to zero.
    pub fn mask_non_contacts(&mut self, mask: &ContactMask) -> Result<usize, PotentialsError> {
        if mask.ncol() != self.ncol {
            return Err(PotentialsError::ContactMaskShape {
                expected: self.ncol,
                found: mask.ncol(),
            });
        }
        let mut masked = 0;
        for (i, j) in (0..self.ncol).tuple_combinations() {
            if mask.is_contact(i, j) {
                continue;
            }
            for (from, to) in [(i, j), (j, i)] {
                let start = self.pair_offset(from, to);
                self.params[start..start + ALPHABET_SIZE * ALPHABET_SIZE].fill(0.0);
            }
            masked += 1;
        }
        Ok(masked)
    }

    #[inline]
    fn pair_offset(&self, i: usize, j: usize) -> usize {
        self.ncol * self.field_states + (i * self.ncol + j) * ALPHABET_SIZE * ALPHABET_SIZE
    }

    fn validate(&self) -> Result<(), PotentialsError> {
        if let Some(index) = self.params.iter().position(|v| !v.is_finite()) {
            return Err(PotentialsError::NonFinite { index });
        }
        if let Some(column) =
            (0..self.ncol).find(|&i| self.pair_block(i, i).iter().any(|&v| v != 0.0))
        {
            return Err(PotentialsError::SelfCoupling { column });
        }
        for (i, j) in (0..self.ncol).tuple_combinations() {
            for (a, b) in (0..ALPHABET_SIZE).cartesian_product(0..ALPHABET_SIZE) {
                let forward = self.pair(i, j, a, b);
                let backward = self.pair(j, i, b, a);
                if (forward - backward).abs() > SYMMETRY_TOLERANCE {
                    return Err(PotentialsError::Asymmetric { i, j, a, b });
                }
            }
        }
        Ok(())
    }
}

fn check_field_states(field_states: usize) -> Result<(), PotentialsError> {
    if field_states == AMINO_ACID_COUNT || field_states == ALPHABET_SIZE {
        Ok(())
    } else {
        Err(PotentialsError::InvalidFieldStates(field_states))
    }
}

fn pair_block_len(ncol: usize) -> usize {
    ncol * ncol * ALPHABET_SIZE * ALPHABET_SIZE
}

/// Symmetric boolean `L x L` contact map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMask {
    ncol: usize,
    contacts: Vec<bool>,
}

impl ContactMask {
    /// A mask with no contacts.
    pub fn new(ncol: usize) -> Self {
        Self {
            ncol,
            contacts: vec![false; ncol * ncol],
        }
    }

    pub fn from_pairs(ncol: usize, pairs: &[(usize, usize)]) -> Result<Self, PotentialsError> {
        let mut mask = Self::new(ncol);
        for &(i, j) in pairs {
            mask.set_contact(i, j)?;
        }
        Ok(mask)
    }

    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn set_contact(&mut self, i: usize, j: usize) -> Result<(), PotentialsError> {
        if i >= self.ncol || j >= self.ncol {
            return Err(PotentialsError::ContactOutOfRange {
                i,
                j,
                ncol: self.ncol,
            });
        }
        self.contacts[i * self.ncol + j] = true;
        self.contacts[j * self.ncol + i] = true;
        Ok(())
    }

    /// Out-of-range pairs are never in contact.
    #[inline]
    pub fn is_contact(&self, i: usize, j: usize) -> bool {
        i < self.ncol && j < self.ncol && self.contacts[i * self.ncol + j]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Random symmetric potentials used across the crate's tests.
    pub(crate) fn random_potentials(ncol: usize, field_states: usize, seed: u64) -> Potentials {
        let mut rng = StdRng::seed_from_u64(seed);
        let field: Vec<f64> = (0..ncol * field_states)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        let mut pair = vec![0.0; pair_block_len(ncol)];
        let idx = |i: usize, j: usize, a: usize, b: usize| {
            ((i * ncol + j) * ALPHABET_SIZE + a) * ALPHABET_SIZE + b
        };
        for i in 0..ncol {
            for j in (i + 1)..ncol {
                for a in 0..ALPHABET_SIZE {
                    for b in 0..ALPHABET_SIZE {
                        let value = rng.gen_range(-0.5..0.5);
                        pair[idx(i, j, a, b)] = value;
                        pair[idx(j, i, b, a)] = value;
                    }
                }
            }
        }
        Potentials::new(ncol, field_states, field, pair).unwrap()
    }

    pub(crate) fn assert_symmetric(potentials: &Potentials) {
        let l = potentials.ncol();
        for i in 0..l {
            for j in 0..l {
                for a in 0..ALPHABET_SIZE {
                    for b in 0..ALPHABET_SIZE {
                        assert_eq!(potentials.pair(i, j, a, b), potentials.pair(j, i, b, a));
                    }
                }
            }
        }
    }

    #[test]
    fn new_lays_out_field_block_before_pair_block() {
        let potentials = random_potentials(3, AMINO_ACID_COUNT, 1);
        let linear = potentials.as_linear();
        assert_eq!(linear.len(), 3 * 20 + 3 * 3 * 21 * 21);
        assert_eq!(linear[20 + 5], potentials.field(1, 5));
        assert_eq!(
            linear[60 + (2 * 21 + 4) * 21 + 7],
            potentials.pair(0, 2, 4, 7)
        );
    }

    #[test]
    fn from_linear_round_trips_the_parameter_vector() {
        let potentials = random_potentials(4, ALPHABET_SIZE, 2);
        let rebuilt =
            Potentials::from_linear(4, ALPHABET_SIZE, potentials.as_linear().to_vec()).unwrap();
        assert_eq!(rebuilt, potentials);
        assert!(rebuilt.has_gap_state());
    }

    #[test]
    fn new_rejects_unsupported_field_state_count() {
        let result = Potentials::new(1, 5, vec![0.0; 5], vec![0.0; 441]);
        assert_eq!(result, Err(PotentialsError::InvalidFieldStates(5)));
    }

    #[test]
    fn new_rejects_asymmetric_couplings() {
        let mut pair = vec![0.0; pair_block_len(2)];
        pair[(21 + 3) * 21 + 4] = 0.7;
        let result = Potentials::new(2, 20, vec![0.0; 40], pair);
        assert_eq!(
            result,
            Err(PotentialsError::Asymmetric {
                i: 0,
                j: 1,
                a: 3,
                b: 4
            })
        );
    }

    #[test]
    fn new_rejects_non_zero_self_coupling() {
        let mut pair = vec![0.0; pair_block_len(2)];
        pair[(3 * 21 + 2) * 21 + 2] = 1.0;
        let result = Potentials::new(2, 20, vec![0.0; 40], pair);
        assert_eq!(result, Err(PotentialsError::SelfCoupling { column: 1 }));
    }

    #[test]
    fn new_rejects_non_finite_values() {
        let mut field = vec![0.0; 20];
        field[3] = f64::NAN;
        let result = Potentials::new(1, 20, field, vec![0.0; pair_block_len(1)]);
        assert_eq!(result, Err(PotentialsError::NonFinite { index: 3 }));
    }

    #[test]
    fn mask_non_contacts_zeroes_both_directions_and_keeps_symmetry() {
        let mut potentials = random_potentials(4, AMINO_ACID_COUNT, 3);
        let mask = ContactMask::from_pairs(4, &[(0, 1), (2, 3)]).unwrap();
        let masked = potentials.mask_non_contacts(&mask).unwrap();

        assert_eq!(masked, 4);
        assert!(potentials.pair_block(0, 2).iter().all(|&v| v == 0.0));
        assert!(potentials.pair_block(2, 0).iter().all(|&v| v == 0.0));
        assert!(potentials.pair_block(0, 1).iter().any(|&v| v != 0.0));
        assert_symmetric(&potentials);
    }

    #[test]
    fn mask_non_contacts_rejects_mask_of_wrong_width() {
        let mut potentials = random_potentials(2, AMINO_ACID_COUNT, 4);
        let result = potentials.mask_non_contacts(&ContactMask::new(3));
        assert_eq!(
            result,
            Err(PotentialsError::ContactMaskShape {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn contact_mask_rejects_out_of_range_pairs() {
        assert_eq!(
            ContactMask::from_pairs(3, &[(0, 1), (1, 3)]),
            Err(PotentialsError::ContactOutOfRange { i: 1, j: 3, ncol: 3 })
        );
        let mut mask = ContactMask::new(2);
        assert!(mask.set_contact(5, 0).is_err());
        assert_eq!(mask, ContactMask::new(2));
        assert!(!mask.is_contact(0, 7));
    }
}
