//! `Mac` contract (§6.2): `{ key_sizes, output_size, init(key), update, finish, reset }`.

use hmac::{Hmac, Mac as _};
use poly1305::universal_hash::KeyInit as Poly1305KeyInit;
use poly1305::Poly1305 as Poly1305Inner;
use sha2::{Sha256, Sha512};

use crate::error::{Error, Result};
use crate::primitives::MacKind;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// A keyed MAC, accumulating input via repeated `update` calls and producing
/// a tag via `finish`. Poly1305 here is single-shot (no incremental update
/// API in the underlying crate), so it buffers internally.
pub enum KeyedMac {
    HmacSha256(Box<HmacSha256>),
    HmacSha512(Box<HmacSha512>),
    Poly1305 { key: [u8; 32], buffer: Vec<u8> },
}

impl KeyedMac {
    pub fn new(kind: MacKind, key: &[u8]) -> Result<Self> {
        if key.len() != kind.key_len() {
            return Err(Error::ConfigInvalid("MAC key length mismatch"));
        }
        match kind {
            MacKind::HmacSha256 => Ok(Self::HmacSha256(Box::new(
                HmacSha256::new_from_slice(key)
                    .map_err(|_| Error::ConfigInvalid("invalid HMAC-SHA256 key"))?,
            ))),
            MacKind::HmacSha512 => Ok(Self::HmacSha512(Box::new(
                HmacSha512::new_from_slice(key)
                    .map_err(|_| Error::ConfigInvalid("invalid HMAC-SHA512 key"))?,
            ))),
            MacKind::Poly1305 => {
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                Ok(Self::Poly1305 {
                    key: k,
                    buffer: Vec::new(),
                })
            }
        }
    }

    pub fn output_size(&self) -> usize {
        match self {
            Self::HmacSha256(_) => 32,
            Self::HmacSha512(_) => 64,
            Self::Poly1305 { .. } => 16,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::HmacSha256(m) => m.update(bytes),
            Self::HmacSha512(m) => m.update(bytes),
            Self::Poly1305 { buffer, .. } => buffer.extend_from_slice(bytes),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        match self {
            Self::HmacSha256(m) => m.finalize().into_bytes().to_vec(),
            Self::HmacSha512(m) => m.finalize().into_bytes().to_vec(),
            Self::Poly1305 { key, buffer } => {
                let mac = Poly1305Inner::new(&key.into());
                mac.compute_unpadded(&buffer).to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_is_deterministic() {
        let key = [1u8; 32];
        let mut a = KeyedMac::new(MacKind::HmacSha256, &key).unwrap();
        a.update(b"hello ");
        a.update(b"world");
        let tag_a = a.finish();

        let mut b = KeyedMac::new(MacKind::HmacSha256, &key).unwrap();
        b.update(b"hello world");
        let tag_b = b.finish();

        assert_eq!(tag_a, tag_b);
        assert_eq!(tag_a.len(), 32);
    }

    #[test]
    fn different_keys_produce_different_tags() {
        let mut a = KeyedMac::new(MacKind::HmacSha256, &[1u8; 32]).unwrap();
        a.update(b"same message");
        let tag_a = a.finish();

        let mut b = KeyedMac::new(MacKind::HmacSha256, &[2u8; 32]).unwrap();
        b.update(b"same message");
        let tag_b = b.finish();

        assert_ne!(tag_a, tag_b);
    }

    #[test]
    fn poly1305_output_size() {
        let mut m = KeyedMac::new(MacKind::Poly1305, &[9u8; 32]).unwrap();
        m.update(b"payload bytes");
        assert_eq!(m.finish().len(), 16);
    }
}
