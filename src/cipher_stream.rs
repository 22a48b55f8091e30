//! CipherStream (C4): a read/write decorator pairing a [`CipherEngine`] with
//! an underlying stream, buffering input into operation-sized strides and
//! smoothing engine output through an internal ring before it reaches the
//! underlying stream.
//!
//! Encryption and decryption need different underlying-stream traits
//! (`Write` vs `Read`), so this is two concrete types rather than one
//! direction-polymorphic decorator.

use std::io::{Read, Write};

use crate::cipher_engine::{CipherCfg, CipherEngine};
use crate::error::{Error, Result};

/// Encrypting write-direction CipherStream. Ring capacity is
/// `operation_size * 256` per §4.3.
pub struct CipherWriteStream<W> {
    inner: W,
    engine: CipherEngine,
    op_buf: Vec<u8>,
    ring: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
    finished: bool,
}

const WRITE_RING_MULTIPLIER: usize = 256;

impl<W: Write> CipherWriteStream<W> {
    pub fn new(inner: W, cfg: &CipherCfg, key: &[u8], iv: &[u8]) -> Result<Self> {
        let engine = CipherEngine::new(cfg, true, key, iv)?;
        Ok(Self {
            inner,
            engine,
            op_buf: Vec::new(),
            ring: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
            finished: false,
        })
    }

    fn ring_capacity(&self) -> usize {
        self.engine.operation_size() * WRITE_RING_MULTIPLIER
    }

    /// Feeds `bytes` through the cipher engine in exact-operation-size
    /// strides; any trailing partial stride is retained internally.
    pub fn write(&mut self, mut bytes: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::ConfigInvalid("write after finish"));
        }
        self.bytes_in += bytes.len() as u64;
        let op = self.engine.operation_size();

        if !self.op_buf.is_empty() {
            let need = op - self.op_buf.len();
            let take = need.min(bytes.len());
            self.op_buf.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.op_buf.len() == op {
                let block = std::mem::take(&mut self.op_buf);
                self.emit_block(&block)?;
            }
        }

        while bytes.len() >= op {
            self.emit_block(&bytes[..op])?;
            bytes = &bytes[op..];
        }
        if !bytes.is_empty() {
            self.op_buf.extend_from_slice(bytes);
        }
        self.maybe_drain()
    }

    fn emit_block(&mut self, block: &[u8]) -> Result<()> {
        let op = self.engine.operation_size();
        let mut out = vec![0u8; op];
        let n = self.engine.process(block, &mut out)?;
        self.ring.extend_from_slice(&out[..n]);
        Ok(())
    }

    fn maybe_drain(&mut self) -> Result<()> {
        let cap = self.ring_capacity();
        if cap.saturating_sub(self.ring.len()) < self.engine.operation_size() {
            self.drain_ring()?;
        }
        Ok(())
    }

    fn drain_ring(&mut self) -> Result<()> {
        if !self.ring.is_empty() {
            self.inner.write_all(&self.ring)?;
            self.bytes_out += self.ring.len() as u64;
            self.ring.clear();
        }
        Ok(())
    }

    /// Finalizes the stream: processes whatever remains in `op_buf`,
    /// drains the ring fully. Idempotent; a second call is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let remainder = std::mem::take(&mut self.op_buf);
        let mut tail = Vec::new();
        self.engine.process_final(&remainder, &mut tail)?;
        self.ring.extend_from_slice(&tail);
        self.drain_ring()
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Decrypting read-direction CipherStream. Accumulates decrypted strides
/// into a ring until it holds enough bytes to satisfy the caller's buffer
/// (or the underlying reader is exhausted), mirroring the write side's
/// "accumulate, then hand off" buffering instead of handing back a single
/// operation's worth of plaintext per call.
pub struct CipherReadStream<R> {
    inner: R,
    engine: CipherEngine,
    ring: Vec<u8>,
    ring_pos: usize,
    bytes_in: u64,
    bytes_out: u64,
    finished: bool,
}

impl<R: Read> CipherReadStream<R> {
    pub fn new(inner: R, cfg: &CipherCfg, key: &[u8], iv: &[u8]) -> Result<Self> {
        let engine = CipherEngine::new(cfg, false, key, iv)?;
        Ok(Self {
            inner,
            engine,
            ring: Vec::new(),
            ring_pos: 0,
            bytes_in: 0,
            bytes_out: 0,
            finished: false,
        })
    }

    /// Reads one operation-sized chunk (or fewer bytes at end of stream)
    /// from the underlying reader, accumulating across short reads.
    fn read_one_stride(&mut self) -> Result<Vec<u8>> {
        let op = self.engine.operation_size();
        let mut chunk = vec![0u8; op];
        let mut filled = 0;
        while filled < op {
            let n = self.inner.read(&mut chunk[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        chunk.truncate(filled);
        self.bytes_in += filled as u64;
        Ok(chunk)
    }

    /// Pulls and processes exactly one stride's worth of plaintext into the
    /// tail of the ring, without disturbing whatever is already queued
    /// ahead of `ring_pos`. Sets `finished` once the underlying reader runs
    /// dry.
    fn refill_one_stride(&mut self) -> Result<()> {
        let chunk = self.read_one_stride()?;
        let op = self.engine.operation_size();
        if chunk.len() == op {
            let mut out = vec![0u8; op];
            let n = self.engine.process(&chunk, &mut out)?;
            self.ring.extend_from_slice(&out[..n]);
        } else {
            self.finished = true;
            self.engine.process_final(&chunk, &mut self.ring)?;
        }
        Ok(())
    }

    /// Drops already-consumed bytes from the front of the ring so it
    /// doesn't grow without bound across many `read` calls.
    fn compact_ring(&mut self) {
        if self.ring_pos > 0 {
            self.ring.drain(..self.ring_pos);
            self.ring_pos = 0;
        }
    }

    /// Reads decrypted plaintext into `buf`, returning the number of bytes
    /// written (0 signals end of stream, mirroring `Read::read`).
    ///
    /// Keeps pulling strides into the ring until it holds at least
    /// `buf.len()` bytes or the underlying reader is exhausted, so a large
    /// caller buffer gets filled in one call rather than one operation's
    /// worth at a time — this keeps a multiplexed consumer's per-visit byte
    /// count matched to what the writer produced per visit.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.compact_ring();
        // A single stride may legitimately produce zero plaintext bytes
        // (e.g. CBC's decrypt side holds the first block back until it
        // knows whether a following block exists), so the loop condition
        // alone — not a separate "did we get anything" check — decides
        // when to stop.
        while self.ring.len() < buf.len() && !self.finished {
            self.refill_one_stride()?;
        }
        if self.ring.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(self.ring.len());
        buf[..n].copy_from_slice(&self.ring[..n]);
        self.ring_pos = n;
        self.bytes_out += n as u64;
        Ok(n)
    }

    /// Reads decrypted plaintext until the underlying stream is exhausted.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(())
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{BlockCipherKind, BlockMode, PaddingKind, StreamCipherKind};

    #[test]
    fn ctr_roundtrips_through_streams() {
        let key = [9u8; 32];
        let iv = [1u8; 16];
        let cfg = CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Ctr, PaddingKind::None, iv.to_vec());

        let mut ciphertext = Vec::new();
        {
            let mut ws = CipherWriteStream::new(&mut ciphertext, &cfg, &key, &iv).unwrap();
            ws.write(b"the quick brown fox jumps over the lazy dog").unwrap();
            ws.finish().unwrap();
            assert_eq!(ws.bytes_in(), 44);
        }

        let mut rs = CipherReadStream::new(ciphertext.as_slice(), &cfg, &key, &iv).unwrap();
        let mut recovered = Vec::new();
        rs.read_to_end(&mut recovered).unwrap();
        assert_eq!(recovered, b"the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn stream_cipher_roundtrips_through_streams() {
        let key = [5u8; 32];
        let nonce = [2u8; 12];
        let cfg = CipherCfg::stream(StreamCipherKind::ChaCha20, nonce.to_vec());

        let mut ciphertext = Vec::new();
        {
            let mut ws = CipherWriteStream::new(&mut ciphertext, &cfg, &key, &nonce).unwrap();
            for chunk in b"some bytes written in several small calls".chunks(3) {
                ws.write(chunk).unwrap();
            }
            ws.finish().unwrap();
        }

        let mut rs = CipherReadStream::new(ciphertext.as_slice(), &cfg, &key, &nonce).unwrap();
        let mut recovered = Vec::new();
        rs.read_to_end(&mut recovered).unwrap();
        assert_eq!(recovered, b"some bytes written in several small calls");
    }

    #[test]
    fn double_finish_is_idempotent() {
        let key = [9u8; 32];
        let iv = [1u8; 16];
        let cfg = CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Ctr, PaddingKind::None, iv.to_vec());
        let mut out = Vec::new();
        let mut ws = CipherWriteStream::new(&mut out, &cfg, &key, &iv).unwrap();
        ws.write(b"abc").unwrap();
        ws.finish().unwrap();
        ws.finish().unwrap();
    }

    #[test]
    fn write_after_finish_rejected() {
        let key = [9u8; 32];
        let iv = [1u8; 16];
        let cfg = CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Ctr, PaddingKind::None, iv.to_vec());
        let mut out = Vec::new();
        let mut ws = CipherWriteStream::new(&mut out, &cfg, &key, &iv).unwrap();
        ws.finish().unwrap();
        assert!(ws.write(b"x").is_err());
    }

    #[test]
    fn cbc_truncated_ciphertext_is_incomplete_block() {
        let key = [9u8; 32];
        let iv = [1u8; 16];
        let cfg = CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Cbc, PaddingKind::Pkcs7, iv.to_vec());
        let mut ciphertext = Vec::new();
        {
            let mut ws = CipherWriteStream::new(&mut ciphertext, &cfg, &key, &iv).unwrap();
            ws.write(b"sixteen byte msg").unwrap();
            ws.finish().unwrap();
        }
        ciphertext.truncate(ciphertext.len() - 3);
        let mut rs = CipherReadStream::new(ciphertext.as_slice(), &cfg, &key, &iv).unwrap();
        let mut recovered = Vec::new();
        assert!(matches!(rs.read_to_end(&mut recovered), Err(Error::IncompleteBlock)));
    }

    #[test]
    fn large_buffer_read_pulls_more_than_one_operation_per_call() {
        let key = [9u8; 32];
        let iv = [1u8; 16];
        let cfg = CipherCfg::block(BlockCipherKind::Aes256, BlockMode::Ctr, PaddingKind::None, iv.to_vec());
        let plaintext: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();

        let mut ciphertext = Vec::new();
        {
            let mut ws = CipherWriteStream::new(&mut ciphertext, &cfg, &key, &iv).unwrap();
            ws.write(&plaintext).unwrap();
            ws.finish().unwrap();
        }

        let mut rs = CipherReadStream::new(ciphertext.as_slice(), &cfg, &key, &iv).unwrap();
        let mut chunk = vec![0u8; 4096];
        let n = rs.read(&mut chunk).unwrap();
        assert_eq!(n, 4096, "a 4096-byte buffer should fill in one call, not one operation (16 bytes) at a time");
        assert_eq!(&chunk[..n], &plaintext[..4096]);

        let mut rest = Vec::new();
        rest.extend_from_slice(&chunk[..n]);
        rs.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, plaintext);
    }
}
