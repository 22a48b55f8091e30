//! `Csprng` contract (§6.2): `{ seed(params), next_u32(), next_int(low, high_exclusive), next_bytes(out) }`.
//!
//! Backs the PayloadMux scheduler (C9): a fixed seed and item set must
//! reproduce a byte-for-byte identical schedule on both writer and reader
//! (MUX-3), so this wraps a deterministic, seedable generator rather than
//! the OS entropy source.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{Error, Result};

pub const SEED_BYTES: usize = 32;

pub struct Csprng {
    rng: ChaCha20Rng,
}

impl Csprng {
    /// Seeds a deterministic generator from exactly 32 bytes of
    /// `PayloadConfig.prng_config`.
    pub fn seed(params: &[u8]) -> Result<Self> {
        let seed: [u8; SEED_BYTES] = params
            .try_into()
            .map_err(|_| Error::ConfigInvalid("PRNG seed must be exactly 32 bytes"))?;
        Ok(Self {
            rng: ChaCha20Rng::from_seed(seed),
        })
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Returns a value in `[low, high_exclusive)`. `high_exclusive` must be
    /// greater than `low`.
    pub fn next_int(&mut self, low: u32, high_exclusive: u32) -> u32 {
        debug_assert!(high_exclusive > low);
        let span = high_exclusive - low;
        low + (self.next_u32() % span)
    }

    pub fn next_bytes(&mut self, out: &mut [u8]) {
        self.rng.fill_bytes(out);
    }
}
