//! `StreamCipher` contract (§6.2): `{ key_sizes, nonce_size, init(encrypt, key, nonce), process }`.

use chacha20::cipher::{KeyIvInit, StreamCipher as _};
use chacha20::ChaCha20;
use salsa20::XSalsa20;

use crate::error::{Error, Result};
use crate::primitives::StreamCipherKind;

/// A keyed stream cipher. Encryption and decryption are the same keystream
/// XOR operation, so there is only one direction here.
pub enum KeyedStreamCipher {
    ChaCha20(Box<ChaCha20>),
    XSalsa20(Box<XSalsa20>),
}

impl KeyedStreamCipher {
    pub fn new(kind: StreamCipherKind, key: &[u8], nonce: &[u8]) -> Result<Self> {
        if key.len() != kind.key_len() {
            return Err(Error::ConfigInvalid("stream cipher key length mismatch"));
        }
        if nonce.len() != kind.nonce_len() {
            return Err(Error::ConfigInvalid("stream cipher nonce length mismatch"));
        }
        match kind {
            StreamCipherKind::ChaCha20 => Ok(Self::ChaCha20(Box::new(
                ChaCha20::new_from_slices(key, nonce)
                    .map_err(|_| Error::ConfigInvalid("invalid ChaCha20 key/nonce"))?,
            ))),
            StreamCipherKind::XSalsa20 => Ok(Self::XSalsa20(Box::new(
                XSalsa20::new_from_slices(key, nonce)
                    .map_err(|_| Error::ConfigInvalid("invalid XSalsa20 key/nonce"))?,
            ))),
        }
    }

    /// XORs `buf` in place with the next `buf.len()` keystream bytes.
    pub fn process(&mut self, buf: &mut [u8]) {
        match self {
            Self::ChaCha20(c) => c.apply_keystream(buf),
            Self::XSalsa20(c) => c.apply_keystream(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_application_is_identity() {
        let key = [7u8; 32];
        let nonce = [3u8; 12];
        let mut cipher = KeyedStreamCipher::new(StreamCipherKind::ChaCha20, &key, &nonce).unwrap();
        let mut buf = b"round trip through the keystream".to_vec();
        let original = buf.clone();
        cipher.process(&mut buf);
        assert_ne!(buf, original);

        let mut cipher2 = KeyedStreamCipher::new(StreamCipherKind::ChaCha20, &key, &nonce).unwrap();
        cipher2.process(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn rejects_wrong_nonce_length() {
        let key = [7u8; 32];
        let nonce = [3u8; 8];
        assert!(KeyedStreamCipher::new(StreamCipherKind::ChaCha20, &key, &nonce).is_err());
    }
}
