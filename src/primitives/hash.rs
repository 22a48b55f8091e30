//! `Hash` contract (§6.2): `{ output_size, update, finish, reset }`.

use sha2::{Digest, Sha256, Sha512};
use sha3::Sha3_256;

use crate::primitives::HashKind;

pub enum KeyedHash {
    Sha256(Sha256),
    Sha512(Sha512),
    Sha3_256(Sha3_256),
}

impl KeyedHash {
    pub fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Sha256 => Self::Sha256(Sha256::new()),
            HashKind::Sha512 => Self::Sha512(Sha512::new()),
            HashKind::Sha3_256 => Self::Sha3_256(Sha3_256::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => Digest::update(h, bytes),
            Self::Sha512(h) => Digest::update(h, bytes),
            Self::Sha3_256(h) => Digest::update(h, bytes),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
            Self::Sha3_256(h) => h.finalize().to_vec(),
        }
    }
}

/// One-shot convenience: hash `bytes` under `kind` in a single call. Exposed
/// alongside the registry's other primitive families even though nothing
/// in this crate's own pipeline currently calls it — key confirmation and
/// UM1 bind their outputs through `KeyedMac` instead, not a bare hash.
pub fn digest(kind: HashKind, bytes: &[u8]) -> Vec<u8> {
    let mut h = KeyedHash::new(kind);
    h.update(bytes);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_length() {
        let out = digest(HashKind::Sha256, b"obscurcore");
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = KeyedHash::new(HashKind::Sha256);
        h.update(b"ab");
        h.update(b"cd");
        let incremental = h.finish();
        let one_shot = digest(HashKind::Sha256, b"abcd");
        assert_eq!(incremental, one_shot);
    }
}
