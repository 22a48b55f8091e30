//! On-disk package framing shared by [`crate::package_writer`] and
//! [`crate::package_reader`] (§3, §6.1): magic tags and the `ManifestHeader`
//! envelope that names which manifest crypto scheme protects the manifest
//! ciphertext that follows it.

use serde::{Deserialize, Serialize};

pub const MAGIC_HEADER: [u8; 8] = *b"OBSCRH01";
pub const MAGIC_TRAILER: [u8; 8] = *b"OBSCRT01";

pub const FORMAT_VERSION: i32 = 1;

/// `{ format_version, scheme_name, scheme_config }` (§6.1). `scheme_config`
/// is the CBOR encoding of the [`crate::manifest::ManifestCryptoConfig`]
/// variant named by `scheme_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestHeader {
    pub format_version: i32,
    pub scheme_name: String,
    pub scheme_config: Vec<u8>,
}
