//! PackageWriter (C10): orchestrates manifest crypto setup, drives the
//! payload multiplexer into a temporary sink, builds and authenticates the
//! manifest, then emits the full on-disk package (§4.9).

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand_core::{OsRng, RngCore};

use crate::cipher_engine::CipherCfg;
use crate::cipher_stream::CipherWriteStream;
use crate::error::{Error, Result};
use crate::kdf_service::derive_working_keys;
use crate::key_agreement;
use crate::key_confirmation::{self, KeyConfirmationCfg};
use crate::mac_stream::{MacCfg, MacWriteStream};
use crate::manifest::{
    Manifest, ManifestCryptoConfig, PayloadConfig, PayloadItem, PayloadItemType, SerializedCurvePublicKey,
    SymmetricCryptoFields,
};
use crate::package::{ManifestHeader, FORMAT_VERSION, MAGIC_HEADER, MAGIC_TRAILER};
use crate::payload_mux::{self, MuxScheme};
use crate::primitives::curve::{CurvePublicKey, CurveSecretKey};
use crate::primitives::kdf::KdfParams;
use crate::primitives::{BlockCipherKind, BlockMode, MacKind, PaddingKind};
use crate::secure_bytes::write_length_prefixed;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// How the manifest is protected: a caller-supplied pre-key, or a one-pass
/// UM1 key agreement between a sender's static key and a recipient's public
/// key (§4.6).
enum WriterCrypto {
    Symmetric { pre_key: Vec<u8> },
    Um1 { sender_priv: CurveSecretKey, recipient_pub: CurvePublicKey },
}

/// Where the interleaved, not-yet-framed payload body is assembled before
/// being copied into the final output (§4.9 step 4: "caller-provided or
/// default in-memory").
pub enum TempStorage {
    InMemory,
    File(PathBuf),
}

trait TempSink: Read + Write + Seek {}
impl<T: Read + Write + Seek> TempSink for T {}

fn open_temp(storage: &TempStorage) -> Result<Box<dyn TempSink>> {
    match storage {
        TempStorage::InMemory => Ok(Box::new(Cursor::new(Vec::<u8>::new()))),
        TempStorage::File(path) => {
            let file = std::fs::OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;
            Ok(Box::new(file))
        }
    }
}

struct PendingItem {
    item: PayloadItem,
    source: Box<dyn Read>,
}

/// Builds and writes a package (§6.3). Construct with [`PackageWriter::with_symmetric_key`]
/// or [`PackageWriter::with_um1`], register items with `add_text`/`add_file`/
/// `add_directory`, then call [`PackageWriter::write`].
pub struct PackageWriter {
    crypto: WriterCrypto,
    items: Vec<PendingItem>,
    layout: MuxScheme,
    temp_storage: TempStorage,
}

impl PackageWriter {
    pub fn with_symmetric_key(pre_key: impl Into<Vec<u8>>) -> Self {
        Self {
            crypto: WriterCrypto::Symmetric { pre_key: pre_key.into() },
            items: Vec::new(),
            layout: MuxScheme::Simple,
            temp_storage: TempStorage::InMemory,
        }
    }

    pub fn with_um1(sender_priv: CurveSecretKey, recipient_pub: CurvePublicKey) -> Self {
        Self {
            crypto: WriterCrypto::Um1 { sender_priv, recipient_pub },
            items: Vec::new(),
            layout: MuxScheme::Simple,
            temp_storage: TempStorage::InMemory,
        }
    }

    pub fn set_payload_layout(&mut self, layout: MuxScheme) -> &mut Self {
        self.layout = layout;
        self
    }

    pub fn set_temp_storage(&mut self, storage: TempStorage) -> &mut Self {
        self.temp_storage = storage;
        self
    }

    fn new_item(relative_path: String, item_type: PayloadItemType, external_length: u64) -> PayloadItem {
        let cipher_cfg = CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Ctr, PaddingKind::None, random_bytes(16));
        let auth_cfg = MacCfg::new(MacKind::HmacSha256);
        let cipher_key = random_bytes(BlockCipherKind::Aes256.key_len());
        let auth_key = random_bytes(MacKind::HmacSha256.key_len());
        let mut identifier = [0u8; 16];
        OsRng.fill_bytes(&mut identifier);
        PayloadItem {
            identifier,
            relative_path,
            item_type,
            external_length,
            internal_length: 0,
            cipher_cfg,
            auth_cfg,
            kdf_cfg: None,
            cipher_key: Some(cipher_key),
            auth_key: Some(auth_key),
            auth_tag: None,
        }
    }

    pub fn add_text(&mut self, name: &str, utf8: &str) -> &mut Self {
        let item = Self::new_item(name.to_string(), PayloadItemType::Utf8Text, utf8.len() as u64);
        self.items.push(PendingItem { item, source: Box::new(Cursor::new(utf8.as_bytes().to_vec())) });
        self
    }

    pub fn add_file(&mut self, path: &Path) -> Result<&mut Self> {
        let metadata = std::fs::metadata(path)?;
        let file = std::fs::File::open(path)?;
        let relative_path = path.to_string_lossy().into_owned();
        let item = Self::new_item(relative_path, PayloadItemType::Binary, metadata.len());
        self.items.push(PendingItem { item, source: Box::new(file) });
        Ok(self)
    }

    pub fn add_directory(&mut self, path: &Path, recursive: bool) -> Result<&mut Self> {
        self.add_directory_inner(path, path, recursive)?;
        Ok(self)
    }

    fn add_directory_inner(&mut self, root: &Path, dir: &Path, recursive: bool) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    self.add_directory_inner(root, &path, recursive)?;
                }
                continue;
            }
            let metadata = entry.metadata()?;
            let file = std::fs::File::open(&path)?;
            let relative_path = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
            let item = Self::new_item(relative_path, PayloadItemType::Binary, metadata.len());
            self.items.push(PendingItem { item, source: Box::new(file) });
        }
        Ok(())
    }

    /// Drives the full write procedure (§4.9), emitting the framed package
    /// to `output`. Leaves `output` in an undefined, truncated state on
    /// error (§7: writers do not attempt partial recovery).
    ///
    /// `close_on_complete` flushes `output` once the trailer has been
    /// written, so a caller handing over a buffered sink (a `BufWriter`, a
    /// socket) doesn't need a separate call to guarantee the trailer has
    /// actually left the process before `write` returns.
    pub fn write<W: Write>(&mut self, output: &mut W, close_on_complete: bool) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::ConfigInvalid("package must contain at least one item"));
        }
        tracing::debug!(items = self.items.len(), scheme = self.layout.scheme_name(), "writing package");

        output.write_all(&MAGIC_HEADER)?;

        let manifest_cipher_cfg =
            CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Ctr, PaddingKind::None, random_bytes(16));
        let manifest_auth_cfg = MacCfg::new(MacKind::HmacSha256);
        let manifest_kdf_cfg = KdfParams::default_scrypt(random_bytes(16));

        let (pre_key_bytes, ephemeral_public_key) = match &self.crypto {
            WriterCrypto::Symmetric { pre_key } => (pre_key.clone(), None),
            WriterCrypto::Um1 { sender_priv, recipient_pub } => {
                let (shared, ephemeral_pub) = key_agreement::initiate(recipient_pub, sender_priv)?;
                (shared.as_bytes().to_vec(), Some(SerializedCurvePublicKey::from_key(&ephemeral_pub)))
            }
        };
        // Wiped on every exit path, including an early `?` return, rather
        // than only on the success path (§9: secure wipe on normal/error/
        // panic paths).
        let pre_key = zeroize::Zeroizing::new(pre_key_bytes);

        let cipher_key_len = manifest_cipher_cfg.key_len()?;
        let mac_key_len = manifest_auth_cfg.key_len()?;
        let working_keys = derive_working_keys(&pre_key, cipher_key_len, mac_key_len, &manifest_kdf_cfg)?;

        let key_confirmation_cfg = KeyConfirmationCfg { mac_cfg: MacCfg::new(MacKind::HmacSha256), salt: random_bytes(16) };
        let key_confirmation_output = key_confirmation::compute(&key_confirmation_cfg, &pre_key)?;

        let payload_cfg = PayloadConfig {
            scheme_name: self.layout.scheme_name(),
            scheme_config: self.layout.to_scheme_config()?,
            prng_name: "ChaCha20Rng".to_string(),
            prng_config: random_bytes(32),
        };

        let mut items: Vec<PayloadItem> = self.items.iter().map(|p| p.item.clone()).collect();
        let mut sources: Vec<Box<dyn Read>> =
            self.items.iter_mut().map(|p| std::mem::replace(&mut p.source, Box::new(Cursor::new(Vec::new())))).collect();
        let pre_keys: HashMap<[u8; 16], Vec<u8>> = HashMap::new();

        let temp = open_temp(&self.temp_storage)?;
        let mut temp = payload_mux::write_items(&mut items, &mut sources, &pre_keys, &payload_cfg, temp)?;

        let manifest = Manifest { payload_config: payload_cfg, items };
        let manifest_bytes = manifest.encode()?;

        let mac_sink = MacWriteStream::new(Vec::new(), &manifest_auth_cfg, &working_keys.mac_key)?;
        let mut cipher_stream = CipherWriteStream::new(mac_sink, &manifest_cipher_cfg, &working_keys.cipher_key, &manifest_cipher_cfg.iv)?;
        cipher_stream.write(&manifest_bytes)?;
        cipher_stream.finish()?;
        let ciphertext_len = cipher_stream.bytes_out();
        let mut mac_stream = cipher_stream.into_inner();

        mac_stream.update(&(ciphertext_len as u32).to_le_bytes())?;
        mac_stream.update(&serde_cbor_bytes(&manifest_cipher_cfg)?)?;
        mac_stream.update(&serde_cbor_bytes(&manifest_auth_cfg)?)?;
        mac_stream.update(&serde_cbor_bytes(&manifest_kdf_cfg)?)?;
        mac_stream.finish()?;
        let auth_tag_output = mac_stream.tag()?.to_vec();
        let ciphertext = mac_stream.into_inner();
        drop(working_keys);

        let symmetric = SymmetricCryptoFields {
            cipher_cfg: manifest_cipher_cfg,
            auth_cfg: manifest_auth_cfg,
            kdf_cfg: manifest_kdf_cfg,
            key_confirmation_cfg,
            key_confirmation_output,
            auth_tag_output,
        };
        let crypto_config = match ephemeral_public_key {
            None => ManifestCryptoConfig::SymmetricOnly(symmetric),
            Some(ephemeral_public_key) => ManifestCryptoConfig::UM1Hybrid { symmetric, ephemeral_public_key },
        };

        let header = ManifestHeader {
            format_version: FORMAT_VERSION,
            scheme_name: crypto_config.scheme_name().to_string(),
            scheme_config: serde_cbor_bytes(&crypto_config)?,
        };
        write_length_prefixed(output, &serde_cbor_bytes(&header)?)?;
        write_length_prefixed(output, &ciphertext)?;

        temp.seek(SeekFrom::Start(0))?;
        std::io::copy(&mut temp, output)?;

        output.write_all(&MAGIC_TRAILER)?;
        if close_on_complete {
            output.flush()?;
        }
        tracing::debug!("package written");
        Ok(())
    }
}

fn serde_cbor_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|_| Error::ConfigInvalid("internal configuration encoding failed"))?;
    Ok(buf)
}
