//! MacStream (C5): a pass-through decorator that feeds every byte crossing
//! it into a keyed MAC. `tag()` is only valid after `finish()`. `update()`
//! lets a caller mix extra bytes into the MAC after the stream portion is
//! done but before `finish()` — used by the manifest write/read procedures
//! to bind the serialized cipher/auth/KDF configuration to the MAC (§4.9
//! step 5, §4.10).

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::primitives::mac::KeyedMac;
use crate::primitives::{MacKind, PrimitiveRegistry};

/// Serialized MAC configuration, as it travels inside a manifest or payload
/// item. Mirrors [`crate::cipher_engine::CipherCfg`]'s string-identifier
/// convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacCfg {
    pub mac: String,
}

impl MacCfg {
    pub fn new(kind: MacKind) -> Self {
        Self { mac: kind.name().to_string() }
    }

    pub fn resolve(&self) -> Result<MacKind> {
        PrimitiveRegistry::mac(&self.mac)
    }

    pub fn key_len(&self) -> Result<usize> {
        Ok(self.resolve()?.key_len())
    }
}

/// A writing MacStream: bytes written pass straight through to the
/// underlying writer and are simultaneously fed into the MAC.
pub struct MacWriteStream<W> {
    inner: W,
    mac: Option<KeyedMac>,
    tag: Option<Vec<u8>>,
}

impl<W: Write> MacWriteStream<W> {
    pub fn new(inner: W, cfg: &MacCfg, key: &[u8]) -> Result<Self> {
        Ok(Self {
            inner,
            mac: Some(KeyedMac::new(cfg.resolve()?, key)?),
            tag: None,
        })
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mac = self.mac.as_mut().ok_or(Error::ConfigInvalid("write after finish"))?;
        mac.update(bytes);
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Mixes extra bytes into the MAC without writing them to the
    /// underlying stream. Valid only before `finish()`.
    pub fn update(&mut self, extra_bytes: &[u8]) -> Result<()> {
        let mac = self.mac.as_mut().ok_or(Error::ConfigInvalid("update after finish"))?;
        mac.update(extra_bytes);
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        if let Some(mac) = self.mac.take() {
            self.tag = Some(mac.finish());
        }
        Ok(())
    }

    /// Valid only after `finish()`.
    pub fn tag(&self) -> Result<&[u8]> {
        self.tag.as_deref().ok_or(Error::ConfigInvalid("tag read before finish"))
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for MacWriteStream<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        MacWriteStream::write(self, buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// A reading MacStream: bytes pulled from the underlying reader are fed
/// into the MAC before being handed to the caller.
pub struct MacReadStream<R> {
    inner: R,
    mac: Option<KeyedMac>,
    tag: Option<Vec<u8>>,
}

impl<R: Read> MacReadStream<R> {
    pub fn new(inner: R, cfg: &MacCfg, key: &[u8]) -> Result<Self> {
        Ok(Self {
            inner,
            mac: Some(KeyedMac::new(cfg.resolve()?, key)?),
            tag: None,
        })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        let mac = self.mac.as_mut().ok_or(Error::ConfigInvalid("read after finish"))?;
        mac.update(&buf[..n]);
        Ok(n)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::FormatInvalid("stream ended before expected length"));
            }
            filled += n;
        }
        Ok(())
    }

    pub fn update(&mut self, extra_bytes: &[u8]) -> Result<()> {
        let mac = self.mac.as_mut().ok_or(Error::ConfigInvalid("update after finish"))?;
        mac.update(extra_bytes);
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        if let Some(mac) = self.mac.take() {
            self.tag = Some(mac.finish());
        }
        Ok(())
    }

    pub fn tag(&self) -> Result<&[u8]> {
        self.tag.as_deref().ok_or(Error::ConfigInvalid("tag read before finish"))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for MacReadStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        MacReadStream::read(self, buf).map_err(std::io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_produce_matching_tags() {
        let key = [4u8; 32];
        let cfg = MacCfg::new(MacKind::HmacSha256);

        let mut sink = Vec::new();
        let mut ws = MacWriteStream::new(&mut sink, &cfg, &key).unwrap();
        ws.write(b"payload bytes").unwrap();
        ws.update(b"bound configuration").unwrap();
        ws.finish().unwrap();
        let write_tag = ws.tag().unwrap().to_vec();

        let mut rs = MacReadStream::new(sink.as_slice(), &cfg, &key).unwrap();
        let mut buf = [0u8; 13];
        rs.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"payload bytes");
        rs.update(b"bound configuration").unwrap();
        rs.finish().unwrap();
        assert_eq!(rs.tag().unwrap(), write_tag.as_slice());
    }

    #[test]
    fn tag_unavailable_before_finish() {
        let key = [4u8; 32];
        let cfg = MacCfg::new(MacKind::HmacSha256);
        let mut sink = Vec::new();
        let ws = MacWriteStream::new(&mut sink, &cfg, &key).unwrap();
        assert!(ws.tag().is_err());
    }
}
