//! The package data model (§3): `Manifest`, `PayloadItem`, `PayloadConfig`,
//! and `ManifestCryptoConfig`. These are the DTOs carried, CBOR-encoded,
//! inside the encrypted manifest.

use serde::{Deserialize, Serialize};

use crate::cipher_engine::CipherCfg;
use crate::error::{Error, Result};
use crate::key_confirmation::KeyConfirmationCfg;
use crate::kdf_service::KdfCfg;
use crate::mac_stream::MacCfg;
use crate::primitives::curve::CurvePublicKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadItemType {
    Binary,
    Utf8Text,
    KeyAction,
}

/// A single payload item's essential attributes (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadItem {
    /// Stable 128-bit identifier.
    pub identifier: [u8; 16],
    pub relative_path: String,
    pub item_type: PayloadItemType,
    /// Bytes the caller will supply; 0 if unknown at write-time.
    pub external_length: u64,
    /// Bytes the item occupies inside the payload body after encryption.
    /// Filled in during write, required during read.
    pub internal_length: u64,
    pub cipher_cfg: CipherCfg,
    pub auth_cfg: MacCfg,
    pub kdf_cfg: Option<KdfCfg>,
    /// Present only when the caller supplies explicit keys directly.
    pub cipher_key: Option<Vec<u8>>,
    pub auth_key: Option<Vec<u8>>,
    /// The final MAC; written during write, verified during read.
    pub auth_tag: Option<Vec<u8>>,
}

impl PayloadItem {
    /// Exactly one of {explicit cipher_key+auth_key, pre-key+kdf_cfg} must
    /// resolve a working key pair (§3 invariant). `pre_key_present`
    /// reflects whether the caller's pre-key map has an entry for this
    /// item's identifier.
    pub fn validate_key_resolution(&self, pre_key_present: bool) -> Result<()> {
        let explicit = self.cipher_key.is_some() && self.auth_key.is_some();
        let via_kdf = pre_key_present && self.kdf_cfg.is_some();
        if explicit == via_kdf {
            // Either neither path resolves, or (pathologically) both do.
            return Err(Error::ItemKeyMissing);
        }
        Ok(())
    }

    /// A copy of this item's metadata with `auth_tag` and `internal_length`
    /// cleared, so the tag can be bound to the metadata without a
    /// chicken-and-egg dependency on the tag it is itself authenticating.
    pub fn authenticatible_clone(&self) -> Self {
        Self {
            auth_tag: None,
            internal_length: 0,
            ..self.clone()
        }
    }

    pub fn serialize_authenticatible(&self) -> Result<Vec<u8>> {
        let clone = self.authenticatible_clone();
        let mut buf = Vec::new();
        ciborium::into_writer(&clone, &mut buf).map_err(|_| Error::ConfigInvalid("item metadata encoding failed"))?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymmetricCryptoFields {
    pub cipher_cfg: CipherCfg,
    pub auth_cfg: MacCfg,
    pub kdf_cfg: KdfCfg,
    pub key_confirmation_cfg: KeyConfirmationCfg,
    pub key_confirmation_output: Vec<u8>,
    pub auth_tag_output: Vec<u8>,
}

/// A curve public key as it travels serialized inside a manifest: the
/// curve identifier plus the encoded point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedCurvePublicKey {
    pub curve: String,
    pub encoded: Vec<u8>,
}

impl SerializedCurvePublicKey {
    pub fn from_key(key: &CurvePublicKey) -> Self {
        Self {
            curve: key.kind().name().to_string(),
            encoded: key.to_bytes(),
        }
    }

    pub fn to_key(&self) -> Result<CurvePublicKey> {
        let kind = crate::primitives::PrimitiveRegistry::curve(&self.curve)?;
        CurvePublicKey::from_bytes(kind, &self.encoded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManifestCryptoConfig {
    SymmetricOnly(SymmetricCryptoFields),
    UM1Hybrid {
        symmetric: SymmetricCryptoFields,
        ephemeral_public_key: SerializedCurvePublicKey,
    },
}

impl ManifestCryptoConfig {
    pub fn scheme_name(&self) -> &'static str {
        match self {
            Self::SymmetricOnly(_) => "SymmetricOnly",
            Self::UM1Hybrid { .. } => "UM1Hybrid",
        }
    }

    pub fn symmetric_fields(&self) -> &SymmetricCryptoFields {
        match self {
            Self::SymmetricOnly(f) => f,
            Self::UM1Hybrid { symmetric, .. } => symmetric,
        }
    }

    pub fn symmetric_fields_mut(&mut self) -> &mut SymmetricCryptoFields {
        match self {
            Self::SymmetricOnly(f) => f,
            Self::UM1Hybrid { symmetric, .. } => symmetric,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub scheme_name: String,
    pub scheme_config: Vec<u8>,
    pub prng_name: String,
    pub prng_config: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub payload_config: PayloadConfig,
    pub items: Vec<PayloadItem>,
}

impl Manifest {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|_| Error::ConfigInvalid("manifest encoding failed"))?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|_| Error::FormatInvalid("manifest decoding failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{BlockCipherKind, BlockMode, MacKind, PaddingKind};

    fn sample_item(id: u8) -> PayloadItem {
        PayloadItem {
            identifier: [id; 16],
            relative_path: format!("item-{id}.bin"),
            item_type: PayloadItemType::Binary,
            external_length: 100,
            internal_length: 0,
            cipher_cfg: CipherCfg::block(
                BlockCipherKind::Aes256,
                BlockMode::Ctr,
                PaddingKind::None,
                vec![0u8; 16],
            ),
            auth_cfg: MacCfg::new(MacKind::HmacSha256),
            kdf_cfg: None,
            cipher_key: Some(vec![1u8; 32]),
            auth_key: Some(vec![2u8; 32]),
            auth_tag: None,
        }
    }

    #[test]
    fn manifest_roundtrips_through_cbor() {
        let manifest = Manifest {
            payload_config: PayloadConfig {
                scheme_name: "Simple".to_string(),
                scheme_config: vec![],
                prng_name: "ChaCha20Rng".to_string(),
                prng_config: vec![0u8; 32],
            },
            items: vec![sample_item(1), sample_item(2)],
        };
        let encoded = manifest.encode().unwrap();
        let decoded = Manifest::decode(&encoded).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.items[0].relative_path, "item-1.bin");
    }

    #[test]
    fn authenticatible_clone_clears_mutable_fields() {
        let mut item = sample_item(9);
        item.auth_tag = Some(vec![0xAB; 32]);
        item.internal_length = 4096;
        let clone = item.authenticatible_clone();
        assert!(clone.auth_tag.is_none());
        assert_eq!(clone.internal_length, 0);
        assert_eq!(clone.identifier, item.identifier);
    }

    #[test]
    fn explicit_keys_satisfy_invariant() {
        let item = sample_item(3);
        assert!(item.validate_key_resolution(false).is_ok());
    }

    #[test]
    fn neither_key_path_is_rejected() {
        let mut item = sample_item(3);
        item.cipher_key = None;
        item.auth_key = None;
        assert!(matches!(
            item.validate_key_resolution(false),
            Err(Error::ItemKeyMissing)
        ));
    }
}
