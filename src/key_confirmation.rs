//! KeyConfirmation (C8): a non-interactive "does the peer hold the same
//! pre-key?" check via a keyed MAC over a fixed canary, so a wrong key is
//! caught fast, before a costly KDF invocation, without revealing the key.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mac_stream::MacCfg;
use crate::primitives::mac::KeyedMac;
use crate::secure_bytes::equal_ct;

/// The fixed, public canary bytes MACed under the candidate key.
const CANARY: &[u8] = b"ObscurCore key confirmation canary v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfirmationCfg {
    pub mac_cfg: MacCfg,
    pub salt: Vec<u8>,
}

/// Computes `MAC_k(salt || canary)` under `cfg.mac_cfg`.
pub fn compute(cfg: &KeyConfirmationCfg, key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = KeyedMac::new(cfg.mac_cfg.resolve()?, key)?;
    mac.update(&cfg.salt);
    mac.update(CANARY);
    Ok(mac.finish())
}

/// Verifies a candidate key against a previously stored expected output, in
/// constant time.
pub fn verify(cfg: &KeyConfirmationCfg, key: &[u8], expected_output: &[u8]) -> Result<bool> {
    let actual = compute(cfg, key)?;
    Ok(equal_ct(&actual, expected_output))
}
