//! Constant-time compare, secure wipe, and length-prefix framing helpers (C2).
//!
//! Every MAC tag compare and key-confirmation compare in this crate goes
//! through [`equal_ct`]; nothing here is allowed to short-circuit on content.

use std::io::{Read, Write};

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Compares two byte slices in time independent of the number of differing
/// bytes. Returns `false` immediately for unequal lengths without touching
/// content (length is not secret in this protocol; only content is).
pub fn equal_ct(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Overwrites `buf` with zeros in a way the optimizer cannot elide.
pub fn wipe(buf: &mut [u8]) {
    buf.zeroize();
}

pub fn u32_le(x: u32) -> [u8; 4] {
    x.to_le_bytes()
}

pub fn u32_from_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Reads a `u32` little-endian length prefix followed by that many bytes.
pub fn read_length_prefixed<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .map_err(|_| Error::FormatInvalid("truncated length prefix"))?;
    let len = u32_from_le(len_buf) as usize;
    let mut out = vec![0u8; len];
    reader
        .read_exact(&mut out)
        .map_err(|_| Error::FormatInvalid("declared length exceeds remaining stream"))?;
    Ok(out)
}

/// Writes a `u32` little-endian length prefix followed by `bytes`.
pub fn write_length_prefixed<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    if bytes.len() > u32::MAX as usize {
        return Err(Error::ConfigInvalid("length-prefixed payload exceeds u32"));
    }
    writer.write_all(&u32_le(bytes.len() as u32))?;
    writer.write_all(bytes)?;
    Ok(())
}
