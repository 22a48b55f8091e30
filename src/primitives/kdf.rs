//! `Kdf` contract (§6.2): `{ derive(pre_key, salt, params, out_len) -> bytes }`.
//!
//! Policy caps live here rather than in `KdfService` (C6): scrypt's cost
//! parameter `N` must be a power of two, and its peak memory (`128 * r * N`
//! bytes) must not exceed [`SCRYPT_MAX_MEMORY_BYTES`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::primitives::KdfKind;

/// Hard cap on scrypt's peak memory footprint (256 MiB).
pub const SCRYPT_MAX_MEMORY_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub kind: KdfKind,
    pub salt: Vec<u8>,
    /// scrypt: log2(N). pbkdf2: unused (0).
    pub log2_n: u8,
    /// scrypt: r. pbkdf2: unused (0).
    pub r: u32,
    /// scrypt: p. pbkdf2: iteration count.
    pub p: u32,
}

impl KdfParams {
    pub fn default_scrypt(salt: Vec<u8>) -> Self {
        Self {
            kind: KdfKind::Scrypt,
            salt,
            log2_n: 15, // N = 32768
            r: 8,
            p: 1,
        }
    }

    pub fn default_pbkdf2(salt: Vec<u8>) -> Self {
        Self {
            kind: KdfKind::Pbkdf2Sha256,
            salt,
            log2_n: 0,
            r: 0,
            p: 200_000,
        }
    }

    fn validate(&self) -> Result<()> {
        match self.kind {
            KdfKind::Scrypt => {
                if self.log2_n == 0 || self.log2_n >= 63 {
                    return Err(Error::ConfigInvalid("scrypt N out of range"));
                }
                if self.r == 0 || self.p == 0 {
                    return Err(Error::ConfigInvalid("scrypt r/p must be nonzero"));
                }
                let n: u64 = 1u64 << self.log2_n;
                let mem = 128u64
                    .saturating_mul(self.r as u64)
                    .saturating_mul(n);
                if mem > SCRYPT_MAX_MEMORY_BYTES {
                    return Err(Error::ConfigInvalid("scrypt memory exceeds policy cap"));
                }
            }
            KdfKind::Pbkdf2Sha256 => {
                if self.p == 0 {
                    return Err(Error::ConfigInvalid("pbkdf2 iteration count must be nonzero"));
                }
            }
        }
        Ok(())
    }
}

/// Runs the configured KDF once, producing `out_len` bytes.
pub fn derive(pre_key: &[u8], params: &KdfParams, out_len: usize) -> Result<Vec<u8>> {
    params.validate()?;
    let mut out = vec![0u8; out_len];
    match params.kind {
        KdfKind::Scrypt => {
            let scrypt_params = scrypt::Params::new(params.log2_n, params.r, params.p, out_len)
                .map_err(|_| Error::ConfigInvalid("scrypt parameters rejected by primitive"))?;
            scrypt::scrypt(pre_key, &params.salt, &scrypt_params, &mut out)
                .map_err(|_| Error::ConfigInvalid("scrypt derivation failed"))?;
        }
        KdfKind::Pbkdf2Sha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(pre_key, &params.salt, params.p, &mut out);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrypt_rejects_non_power_of_two_indirectly() {
        // log2_n is stored as a power-of-two exponent, so validity is
        // structural; this checks the memory-cap path instead.
        let mut params = KdfParams::default_scrypt(vec![1, 2, 3]);
        params.log2_n = 40; // N = 2^40, wildly over the memory cap
        assert!(matches!(
            derive(b"prekey", &params, 32),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn pbkdf2_is_deterministic() {
        let params = KdfParams::default_pbkdf2(vec![9, 9, 9]);
        let a = derive(b"prekey", &params, 32).unwrap();
        let b = derive(b"prekey", &params, 32).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pbkdf2_rejects_zero_iterations() {
        let mut params = KdfParams::default_pbkdf2(vec![9, 9, 9]);
        params.p = 0;
        assert!(derive(b"prekey", &params, 32).is_err());
    }
}
