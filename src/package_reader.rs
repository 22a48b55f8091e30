//! PackageReader (C11): mirror of [`crate::package_writer::PackageWriter`]
//! (§4.10) — validates magic tags, derives manifest keys, decrypts and
//! authenticates the manifest, then drives the payload demultiplexer.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use crate::cipher_stream::CipherReadStream;
use crate::error::{AuthScope, Error, Result};
use crate::kdf_service::derive_working_keys;
use crate::key_agreement;
use crate::key_confirmation;
use crate::mac_stream::MacReadStream;
use crate::manifest::{Manifest, ManifestCryptoConfig, PayloadItem};
use crate::package::{ManifestHeader, FORMAT_VERSION, MAGIC_HEADER, MAGIC_TRAILER};
use crate::payload_mux;
use crate::primitives::curve::{CurvePublicKey, CurveSecretKey};
use crate::secure_bytes::{equal_ct, read_length_prefixed};

/// How the manifest is protected, from the reading side — must match
/// whichever construction the writer used (§6.3).
enum ReaderCrypto {
    Symmetric { pre_key: Vec<u8> },
    Um1 { recipient_priv: CurveSecretKey, sender_pub: CurvePublicKey },
}

/// A manifest decrypted and authenticated, but not yet demultiplexed — the
/// result of [`PackageReader::read_manifest`].
pub struct ManifestView {
    manifest: Manifest,
}

impl ManifestView {
    pub fn items(&self) -> &[PayloadItem] {
        &self.manifest.items
    }
}

/// Reads a package (§6.3). Construct with [`PackageReader::with_symmetric_key`]
/// or [`PackageReader::with_um1`].
pub struct PackageReader {
    crypto: ReaderCrypto,
}

impl PackageReader {
    pub fn with_symmetric_key(pre_key: impl Into<Vec<u8>>) -> Self {
        Self { crypto: ReaderCrypto::Symmetric { pre_key: pre_key.into() } }
    }

    pub fn with_um1(recipient_priv: CurveSecretKey, sender_pub: CurvePublicKey) -> Self {
        Self { crypto: ReaderCrypto::Um1 { recipient_priv, sender_pub } }
    }

    /// Verifies the header tag, decrypts and authenticates the manifest,
    /// and parses it — but does not yet touch the payload body. The
    /// returned view carries everything [`PackageReader::extract_to`] needs
    /// to demultiplex the remainder of `input`.
    pub fn read_manifest<R: Read>(&self, input: &mut R) -> Result<ManifestView> {
        let mut header_tag = [0u8; 8];
        input.read_exact(&mut header_tag).map_err(|_| Error::FormatInvalid("truncated header tag"))?;
        if header_tag != MAGIC_HEADER {
            return Err(Error::FormatInvalid("bad magic header"));
        }

        let header_bytes = read_length_prefixed(input)?;
        let header: ManifestHeader =
            ciborium::from_reader(header_bytes.as_slice()).map_err(|_| Error::FormatInvalid("malformed manifest header"))?;
        if header.format_version != FORMAT_VERSION {
            return Err(Error::FormatInvalid("unsupported format version"));
        }

        let crypto_config: ManifestCryptoConfig = ciborium::from_reader(header.scheme_config.as_slice())
            .map_err(|_| Error::FormatInvalid("malformed manifest crypto config"))?;
        if crypto_config.scheme_name() != header.scheme_name {
            return Err(Error::FormatInvalid("scheme name disagrees with scheme config"));
        }

        let pre_key = self.resolve_pre_key(&crypto_config)?;
        let symmetric = crypto_config.symmetric_fields();

        if !key_confirmation::verify(&symmetric.key_confirmation_cfg, &pre_key, &symmetric.key_confirmation_output)? {
            tracing::warn!("key confirmation failed, rejecting before running KDF");
            return Err(Error::CiphertextAuthentication(AuthScope::Manifest));
        }

        let cipher_key_len = symmetric.cipher_cfg.key_len()?;
        let mac_key_len = symmetric.auth_cfg.key_len()?;
        let working_keys = derive_working_keys(&pre_key, cipher_key_len, mac_key_len, &symmetric.kdf_cfg)?;

        let ciphertext = read_length_prefixed(input)?;

        let mac_source = MacReadStream::new(Cursor::new(ciphertext.as_slice()), &symmetric.auth_cfg, &working_keys.mac_key)?;
        let mut cipher_source =
            CipherReadStream::new(mac_source, &symmetric.cipher_cfg, &working_keys.cipher_key, &symmetric.cipher_cfg.iv)?;
        let mut manifest_bytes = Vec::new();
        cipher_source.read_to_end(&mut manifest_bytes)?;
        let mut mac_source = cipher_source.into_inner();

        mac_source.update(&(ciphertext.len() as u32).to_le_bytes())?;
        mac_source.update(&serde_cbor_bytes(&symmetric.cipher_cfg)?)?;
        mac_source.update(&serde_cbor_bytes(&symmetric.auth_cfg)?)?;
        mac_source.update(&serde_cbor_bytes(&symmetric.kdf_cfg)?)?;
        mac_source.finish()?;
        if !equal_ct(mac_source.tag()?, &symmetric.auth_tag_output) {
            tracing::warn!("manifest authentication failed");
            return Err(Error::CiphertextAuthentication(AuthScope::Manifest));
        }

        let manifest = Manifest::decode(&manifest_bytes)?;
        tracing::debug!(items = manifest.items.len(), "manifest authenticated");
        Ok(ManifestView { manifest })
    }

    fn resolve_pre_key(&self, crypto_config: &ManifestCryptoConfig) -> Result<Vec<u8>> {
        match (&self.crypto, crypto_config) {
            (ReaderCrypto::Symmetric { pre_key }, ManifestCryptoConfig::SymmetricOnly(_)) => Ok(pre_key.clone()),
            (
                ReaderCrypto::Um1 { recipient_priv, sender_pub },
                ManifestCryptoConfig::UM1Hybrid { ephemeral_public_key, .. },
            ) => {
                let ephemeral_pub = ephemeral_public_key.to_key()?;
                let shared = key_agreement::respond(sender_pub, recipient_priv, &ephemeral_pub)?;
                Ok(shared.as_bytes().to_vec())
            }
            _ => Err(Error::ConfigInvalid("reader construction disagrees with manifest crypto scheme")),
        }
    }

    /// Drives the payload demultiplexer: for every item in `manifest`, exactly
    /// `item.internal_length` ciphertext bytes are pulled from `input`,
    /// decrypted, verified, and handed to the sink `sink_factory` returns for
    /// that item, in manifest order. Verifies the trailer tag on completion.
    pub fn extract_to<R: Read>(
        &self,
        manifest: ManifestView,
        input: &mut R,
        mut sink_factory: impl FnMut(&PayloadItem) -> Result<Box<dyn Write>>,
    ) -> Result<()> {
        let Manifest { payload_config, mut items } = manifest.manifest;
        let mut sinks: Vec<Box<dyn Write>> = items.iter().map(&mut sink_factory).collect::<Result<_>>()?;
        let pre_keys: HashMap<[u8; 16], Vec<u8>> = HashMap::new();

        payload_mux::read_items(&mut items, &mut sinks, &pre_keys, &payload_config, input)?;

        let mut trailer_tag = [0u8; 8];
        input.read_exact(&mut trailer_tag).map_err(|_| Error::FormatInvalid("truncated trailer tag"))?;
        if trailer_tag != MAGIC_TRAILER {
            return Err(Error::FormatInvalid("bad magic trailer"));
        }
        tracing::debug!("package extracted");
        Ok(())
    }
}

fn serde_cbor_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|_| Error::ConfigInvalid("internal configuration encoding failed"))?;
    Ok(buf)
}
