use phf::{Map, phf_map};

/// Number of states in the alignment alphabet (20 amino acids plus the gap).
pub const ALPHABET_SIZE: usize = 21;

/// Number of amino-acid states, i.e. the alphabet without the gap.
pub const AMINO_ACID_COUNT: usize = 20;

/// Integer code of the gap state.
pub const GAP: u8 = 20;

/// Symbol for every code, indexed by code.
pub const SYMBOLS: [char; ALPHABET_SIZE] = [
    'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T', 'W', 'Y',
    'V', '-',
];

static SYMBOL_CODES: Map<char, u8> = phf_map! {
    'A' => 0, 'R' => 1, 'N' => 2, 'D' => 3, 'C' => 4,
    'Q' => 5, 'E' => 6, 'G' => 7, 'H' => 8, 'I' => 9,
    'L' => 10, 'K' => 11, 'M' => 12, 'F' => 13, 'P' => 14,
    'S' => 15, 'T' => 16, 'W' => 17, 'Y' => 18, 'V' => 19,
    '-' => 20, '.' => 20,
};

/// Maps a one-letter symbol to its code. Lowercase letters are accepted and
/// any unknown symbol is treated as a gap.
pub fn encode(symbol: char) -> u8 {
    SYMBOL_CODES
        .get(&symbol.to_ascii_uppercase())
        .copied()
        .unwrap_or(GAP)
}

/// Maps a code back to its one-letter symbol, or `None` for out-of-range codes.
pub fn decode(code: u8) -> Option<char> {
    SYMBOLS.get(code as usize).copied()
}

pub fn encode_str(sequence: &str) -> Vec<u8> {
    sequence.chars().map(encode).collect()
}

pub fn decode_codes(codes: &[u8]) -> String {
    codes
        .iter()
        .map(|&code| decode(code).unwrap_or('X'))
        .collect()
}
