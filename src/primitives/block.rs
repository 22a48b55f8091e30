//! `BlockCipher` contract (§6.2): `{ block_size, key_sizes, init(encrypt, key), process_block }`.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};

use crate::error::{Error, Result};
use crate::primitives::BlockCipherKind;

/// A keyed AES block cipher, fixed-function (single 16-byte block per call).
pub enum KeyedBlockCipher {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl KeyedBlockCipher {
    pub fn new(kind: BlockCipherKind, key: &[u8]) -> Result<Self> {
        if key.len() != kind.key_len() {
            return Err(Error::ConfigInvalid("block cipher key length mismatch"));
        }
        match kind {
            BlockCipherKind::Aes128 => Ok(Self::Aes128(Box::new(Aes128::new_from_slice(key)
                .map_err(|_| Error::ConfigInvalid("invalid AES-128 key"))?))),
            BlockCipherKind::Aes256 => Ok(Self::Aes256(Box::new(Aes256::new_from_slice(key)
                .map_err(|_| Error::ConfigInvalid("invalid AES-256 key"))?))),
        }
    }

    pub const BLOCK_SIZE: usize = 16;

    pub fn encrypt_block(&self, block: &mut [u8; 16]) {
        let mut ga = (*block).into();
        match self {
            Self::Aes128(c) => c.encrypt_block(&mut ga),
            Self::Aes256(c) => c.encrypt_block(&mut ga),
        }
        *block = ga.into();
    }

    pub fn decrypt_block(&self, block: &mut [u8; 16]) {
        let mut ga = (*block).into();
        match self {
            Self::Aes128(c) => c.decrypt_block(&mut ga),
            Self::Aes256(c) => c.decrypt_block(&mut ga),
        }
        *block = ga.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_is_identity() {
        let key = [0x42u8; 32];
        let cipher = KeyedBlockCipher::new(BlockCipherKind::Aes256, &key).unwrap();
        let mut block = *b"sixteen byte msg";
        let original = block;
        cipher.encrypt_block(&mut block);
        assert_ne!(block, original);
        cipher.decrypt_block(&mut block);
        assert_eq!(block, original);
    }

    #[test]
    fn rejects_wrong_key_length() {
        let key = [0u8; 10];
        assert!(KeyedBlockCipher::new(BlockCipherKind::Aes256, &key).is_err());
    }
}
