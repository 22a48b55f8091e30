//! # ObscurCore
//!
//! Encrypted, authenticated multi-item archive format.
//!
//! A package is a manifest — itself encrypted and MAC-protected — describing
//! a set of payload items, followed by the items' ciphertext interleaved by
//! a PRNG-driven multiplexer (§1, §3). Every construction in this crate is
//! Encrypt-then-MAC: nothing here ever relies on an AEAD mode's built-in tag.
//!
//! ## Quick start
//!
//! ```rust
//! use obscurcore::PackageWriter;
//! use obscurcore::PackageReader;
//!
//! let mut writer = PackageWriter::with_symmetric_key(b"a shared pre-key".to_vec());
//! writer.add_text("hello.txt", "hello, package");
//! let mut packed = Vec::new();
//! writer.write(&mut packed, true).unwrap();
//!
//! let reader = PackageReader::with_symmetric_key(b"a shared pre-key".to_vec());
//! let mut cursor = std::io::Cursor::new(packed);
//! let manifest = reader.read_manifest(&mut cursor).unwrap();
//! let mut out = Vec::new();
//! reader
//!     .extract_to(manifest, &mut cursor, |_item| Ok(Box::new(&mut out) as Box<dyn std::io::Write>))
//!     .unwrap();
//! ```
//!
//! ## What's not provided
//!
//! - Key management or distribution — callers supply pre-keys or static
//!   curve keypairs directly.
//! - Compression.
//! - Random access into a package; items are produced and consumed in
//!   manifest order through the multiplexer.

#![deny(unsafe_code)]

// ---------------------------------------------------------------------------
// Primitive layer (C1): algorithm registry and per-family contracts.
// ---------------------------------------------------------------------------
pub mod primitives;

// ---------------------------------------------------------------------------
// Core building blocks (C2-C9): always available, no file I/O required.
// ---------------------------------------------------------------------------
mod cipher_engine;
mod cipher_stream;
mod error;
mod kdf_service;
mod key_agreement;
mod key_confirmation;
mod mac_stream;
mod manifest;
mod payload_mux;
mod secure_bytes;

pub use cipher_engine::CipherCfg;
pub use error::{AuthScope, Error, Result};
pub use kdf_service::{derive_working_keys, KdfCfg, WorkingKeys};
pub use key_agreement::SharedSecret;
pub use key_confirmation::KeyConfirmationCfg;
pub use mac_stream::MacCfg;
pub use manifest::{
    Manifest, ManifestCryptoConfig, PayloadConfig, PayloadItem, PayloadItemType, SerializedCurvePublicKey,
    SymmetricCryptoFields,
};
pub use payload_mux::MuxScheme;
pub use secure_bytes::equal_ct;

// ---------------------------------------------------------------------------
// Package layer (C10-C11): std-only, reads/writes a full framed package.
// ---------------------------------------------------------------------------
#[cfg(feature = "std")]
mod package;
#[cfg(feature = "std")]
mod package_reader;
#[cfg(feature = "std")]
mod package_writer;

#[cfg(feature = "std")]
pub use package::{ManifestHeader, FORMAT_VERSION, MAGIC_HEADER, MAGIC_TRAILER};
#[cfg(feature = "std")]
pub use package_reader::{ManifestView, PackageReader};
#[cfg(feature = "std")]
pub use package_writer::{PackageWriter, TempStorage};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
