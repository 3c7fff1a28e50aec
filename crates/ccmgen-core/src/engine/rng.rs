//! Seed derivation for the per-worker random number streams.
//!
//! Every unit of parallel work (a tree edge, an MCMC chain, the root ancestor)
//! owns a `StdRng` seeded from `(master seed, stream id)` through SipHash-1-3
//! with fixed zero keys. The stream a worker sees therefore depends only on
//! its id, never on scheduling, and parallel runs reproduce sequential ones.

use rand::SeedableRng;
use rand::rngs::StdRng;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Stream id reserved for the root ancestor of a tree run.
///
/// Node streams use the node index, so the ancestor takes the top of the range.
pub const ANCESTOR_STREAM: u64 = u64::MAX;

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// A generator positioned at the start of substream `stream` of `master_seed`.
pub fn stream_rng(master_seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(derive_substream_seed(master_seed, stream))
}
