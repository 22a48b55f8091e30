//! PrimitiveRegistry (C1): lookup tables from algorithm identifiers to
//! primitive constructors, and the §6.2 primitive-library contracts
//! (`BlockCipher`, `StreamCipher`, `Mac`, `Hash`, `Kdf`, `EcCurve`, `Csprng`).
//!
//! Every variant here is a tagged enum rather than a trait object hierarchy
//! (see the "dynamic dispatch" design note) — new primitives are added by
//! extending the match arms below, not by growing an inheritance tree.

pub mod block;
pub mod csprng;
pub mod curve;
pub mod hash;
pub mod kdf;
pub mod mac;
pub mod stream;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockCipherKind {
    Aes128,
    Aes256,
}

impl BlockCipherKind {
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Aes128 => "AES128",
            Self::Aes256 => "AES256",
        }
    }

    pub const BLOCK_SIZE: usize = 16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamCipherKind {
    ChaCha20,
    XSalsa20,
}

impl StreamCipherKind {
    pub fn key_len(self) -> usize {
        match self {
            Self::ChaCha20 => 32,
            Self::XSalsa20 => 32,
        }
    }

    pub fn nonce_len(self) -> usize {
        match self {
            Self::ChaCha20 => 12,
            Self::XSalsa20 => 24,
        }
    }

    /// A cipher-chosen small multiple of the word size (§4.2): two 32-bit
    /// words per operation for both families here.
    pub fn operation_size(self) -> usize {
        8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ChaCha20 => "ChaCha20",
            Self::XSalsa20 => "XSalsa20",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockMode {
    Ctr,
    Cfb,
    Ofb,
    Cbc,
    CtsCbc,
    Gcm,
    Eax,
}

impl BlockMode {
    pub fn is_aead(self) -> bool {
        matches!(self, Self::Gcm | Self::Eax)
    }

    /// Whether this mode requires a padding scheme for non-block-sized
    /// trailing plaintext.
    pub fn requires_padding(self) -> bool {
        matches!(self, Self::Cbc)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ctr => "CTR",
            Self::Cfb => "CFB",
            Self::Ofb => "OFB",
            Self::Cbc => "CBC",
            Self::CtsCbc => "CTS_CBC",
            Self::Gcm => "GCM",
            Self::Eax => "EAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingKind {
    None,
    Pkcs7,
}

impl PaddingKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Pkcs7 => "PKCS7",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacKind {
    HmacSha256,
    HmacSha512,
    Poly1305,
}

impl MacKind {
    pub fn output_size(self) -> usize {
        match self {
            Self::HmacSha256 => 32,
            Self::HmacSha512 => 64,
            Self::Poly1305 => 16,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            Self::HmacSha256 => 32,
            Self::HmacSha512 => 64,
            Self::Poly1305 => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::HmacSha256 => "HMAC-SHA256",
            Self::HmacSha512 => "HMAC-SHA512",
            Self::Poly1305 => "Poly1305-AES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashKind {
    Sha256,
    Sha512,
    Sha3_256,
}

impl HashKind {
    pub fn output_size(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
            Self::Sha3_256 => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Sha3_256 => "SHA3-256",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfKind {
    Scrypt,
    Pbkdf2Sha256,
}

impl KdfKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Scrypt => "scrypt",
            Self::Pbkdf2Sha256 => "PBKDF2-SHA256",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    Curve25519,
    Secp256r1,
}

impl CurveKind {
    pub fn field_byte_length(self) -> usize {
        match self {
            Self::Curve25519 => 32,
            Self::Secp256r1 => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Curve25519 => "Curve25519",
            Self::Secp256r1 => "secp256r1",
        }
    }
}

/// Lookup tables from algorithm identifiers (as they appear in serialized
/// configuration) to the tagged primitive kinds above.
pub struct PrimitiveRegistry;

impl PrimitiveRegistry {
    pub fn block_cipher(name: &str) -> Result<BlockCipherKind> {
        match name {
            "AES128" => Ok(BlockCipherKind::Aes128),
            "AES256" => Ok(BlockCipherKind::Aes256),
            _ => Err(Error::ConfigInvalid("unknown block cipher identifier")),
        }
    }

    pub fn stream_cipher(name: &str) -> Result<StreamCipherKind> {
        match name {
            "ChaCha20" => Ok(StreamCipherKind::ChaCha20),
            "XSalsa20" => Ok(StreamCipherKind::XSalsa20),
            _ => Err(Error::ConfigInvalid("unknown stream cipher identifier")),
        }
    }

    pub fn block_mode(name: &str) -> Result<BlockMode> {
        match name {
            "CTR" => Ok(BlockMode::Ctr),
            "CFB" => Ok(BlockMode::Cfb),
            "OFB" => Ok(BlockMode::Ofb),
            "CBC" => Ok(BlockMode::Cbc),
            "CTS_CBC" => Ok(BlockMode::CtsCbc),
            "GCM" => Ok(BlockMode::Gcm),
            "EAX" => Ok(BlockMode::Eax),
            _ => Err(Error::ConfigInvalid("unknown block mode identifier")),
        }
    }

    pub fn padding(name: &str) -> Result<PaddingKind> {
        match name {
            "None" => Ok(PaddingKind::None),
            "PKCS7" => Ok(PaddingKind::Pkcs7),
            _ => Err(Error::ConfigInvalid("unknown padding identifier")),
        }
    }

    pub fn mac(name: &str) -> Result<MacKind> {
        match name {
            "HMAC-SHA256" => Ok(MacKind::HmacSha256),
            "HMAC-SHA512" => Ok(MacKind::HmacSha512),
            "Poly1305" | "Poly1305-AES" => Ok(MacKind::Poly1305),
            _ => Err(Error::ConfigInvalid("unknown MAC identifier")),
        }
    }

    pub fn hash(name: &str) -> Result<HashKind> {
        match name {
            "SHA256" => Ok(HashKind::Sha256),
            "SHA512" => Ok(HashKind::Sha512),
            "SHA3-256" => Ok(HashKind::Sha3_256),
            _ => Err(Error::ConfigInvalid("unknown hash identifier")),
        }
    }

    pub fn kdf(name: &str) -> Result<KdfKind> {
        match name {
            "scrypt" => Ok(KdfKind::Scrypt),
            "PBKDF2-SHA256" => Ok(KdfKind::Pbkdf2Sha256),
            _ => Err(Error::ConfigInvalid("unknown KDF identifier")),
        }
    }

    pub fn curve(name: &str) -> Result<CurveKind> {
        match name {
            "Curve25519" => Ok(CurveKind::Curve25519),
            "secp256r1" => Ok(CurveKind::Secp256r1),
            _ => Err(Error::ConfigInvalid("unknown curve identifier")),
        }
    }
}
