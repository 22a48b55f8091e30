//! KdfService (C6): derives a pair of working keys (cipher, MAC) of
//! requested lengths from a pre-key, in a single KDF invocation.

use zeroize::Zeroize;

use crate::error::Result;
use crate::primitives::kdf::{self, KdfParams};

/// Serialized KDF configuration carried by a manifest or payload item.
pub type KdfCfg = KdfParams;

/// A derived cipher/MAC key pair. Never serialized; wiped on drop.
#[derive(Debug)]
pub struct WorkingKeys {
    pub cipher_key: Vec<u8>,
    pub mac_key: Vec<u8>,
}

impl Drop for WorkingKeys {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
    }
}

/// Runs the configured KDF once over `pre_key`, producing
/// `cipher_key_len + mac_key_len` bytes and splitting them in that order.
pub fn derive_working_keys(
    pre_key: &[u8],
    cipher_key_len: usize,
    mac_key_len: usize,
    cfg: &KdfCfg,
) -> Result<WorkingKeys> {
    let mut derived = kdf::derive(pre_key, cfg, cipher_key_len + mac_key_len)?;
    let mac_key = derived.split_off(cipher_key_len);
    let cipher_key = derived;
    Ok(WorkingKeys { cipher_key, mac_key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_derived_material_in_order() {
        let cfg = KdfCfg::default_pbkdf2(vec![1, 2, 3, 4]);
        let keys = derive_working_keys(b"pre-key material", 16, 32, &cfg).unwrap();
        assert_eq!(keys.cipher_key.len(), 16);
        assert_eq!(keys.mac_key.len(), 32);

        let whole = kdf::derive(b"pre-key material", &cfg, 48).unwrap();
        assert_eq!(keys.cipher_key, whole[..16]);
        assert_eq!(keys.mac_key, whole[16..]);
    }

    #[test]
    fn deterministic_and_idempotent() {
        let cfg = KdfCfg::default_pbkdf2(vec![9, 9]);
        let a = derive_working_keys(b"k", 16, 16, &cfg).unwrap();
        let b = derive_working_keys(b"k", 16, 16, &cfg).unwrap();
        assert_eq!(a.cipher_key, b.cipher_key);
        assert_eq!(a.mac_key, b.mac_key);
    }
}
