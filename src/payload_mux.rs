//! PayloadMux (C9): interleaves per-item Encrypt-then-MAC pipelines into a
//! single outer byte stream, next-item selection driven by a PRNG shared
//! deterministically between writer and reader (§4.8).
//!
//! The source's mux held back-references between items and the scheduler;
//! here the mux owns the item list outright and each per-item pipeline is a
//! local value, built lazily on first selection and torn down on that
//! item's completion — no back-pointers (§9).

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Take, Write};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::cipher_stream::{CipherReadStream, CipherWriteStream};
use crate::error::{AuthScope, Error, Result};
use crate::kdf_service::derive_working_keys;
use crate::mac_stream::{MacReadStream, MacWriteStream};
use crate::manifest::{PayloadConfig, PayloadItem};
use crate::primitives::csprng::Csprng;
use crate::secure_bytes::equal_ct;

/// Bytes of plaintext transferred through an item's pipeline per scheduling
/// visit (§4.8: "up to op_buf_size (4096) bytes").
pub const OP_CHUNK_SIZE: usize = 4096;

/// A single outer stream shared by every live per-item pipeline. Only one
/// pipeline is ever active at a time (§5: single-threaded cooperative), so
/// `Rc<RefCell<_>>` is the appropriate shared-ownership tool rather than a
/// `Mutex` or unsafe aliasing.
struct SharedStream<S>(Rc<RefCell<S>>);

impl<S> SharedStream<S> {
    fn new(inner: S) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }

    /// Recovers the underlying stream once every pipeline referencing it has
    /// been dropped.
    fn into_inner(self) -> Result<S> {
        Rc::try_unwrap(self.0)
            .map(RefCell::into_inner)
            .map_err(|_| Error::ConfigInvalid("outer stream still referenced by a live pipeline"))
    }
}

impl<S> Clone for SharedStream<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S: Write> Write for SharedStream<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

impl<S: Read> Read for SharedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FrameshiftParams {
    pad_min: u32,
    pad_max: u32,
}

/// The two payload layout schemes named in §4.8.
#[derive(Debug, Clone, Copy)]
pub enum MuxScheme {
    Simple,
    Frameshift { pad_min: u32, pad_max: u32 },
}

impl MuxScheme {
    fn name(self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Frameshift { .. } => "Frameshift",
        }
    }

    pub fn to_scheme_config(self) -> Result<Vec<u8>> {
        match self {
            Self::Simple => Ok(Vec::new()),
            Self::Frameshift { pad_min, pad_max } => {
                let mut buf = Vec::new();
                ciborium::into_writer(&FrameshiftParams { pad_min, pad_max }, &mut buf)
                    .map_err(|_| Error::ConfigInvalid("frameshift config encoding failed"))?;
                Ok(buf)
            }
        }
    }

    pub fn scheme_name(self) -> String {
        self.name().to_string()
    }

    fn from_payload_config(cfg: &PayloadConfig) -> Result<Self> {
        match cfg.scheme_name.as_str() {
            "Simple" => Ok(Self::Simple),
            "Frameshift" => {
                let params: FrameshiftParams = ciborium::from_reader(cfg.scheme_config.as_slice())
                    .map_err(|_| Error::ConfigInvalid("frameshift config decoding failed"))?;
                if params.pad_min > params.pad_max {
                    return Err(Error::ConfigInvalid("frameshift pad_min exceeds pad_max"));
                }
                Ok(Self::Frameshift { pad_min: params.pad_min, pad_max: params.pad_max })
            }
            _ => Err(Error::ConfigInvalid("unknown payload mux scheme")),
        }
    }
}

/// Picks the next not-yet-completed item index. Starts at a PRNG-chosen
/// offset and linearly searches forward, wrapping around to index 0 (§4.8
/// scheduler contract). Returns `None` once every item is complete.
fn next_source(prng: &mut Csprng, completed: &[bool]) -> Option<usize> {
    let n = completed.len();
    if completed.iter().all(|&c| c) {
        return None;
    }
    let start = prng.next_int(0, n as u32) as usize;
    (0..n).map(|offset| (start + offset) % n).find(|&idx| !completed[idx])
}

fn resolve_item_keys(item: &PayloadItem, pre_keys: &HashMap<[u8; 16], Vec<u8>>) -> Result<(Vec<u8>, Vec<u8>)> {
    if let (Some(cipher_key), Some(auth_key)) = (&item.cipher_key, &item.auth_key) {
        return Ok((cipher_key.clone(), auth_key.clone()));
    }
    if let Some(pre_key) = pre_keys.get(&item.identifier) {
        let kdf_cfg = item.kdf_cfg.as_ref().ok_or(Error::ItemKeyMissing)?;
        let cipher_len = item.cipher_cfg.key_len()?;
        let mac_len = item.auth_cfg.key_len()?;
        let keys = derive_working_keys(pre_key, cipher_len, mac_len, kdf_cfg)?;
        return Ok((keys.cipher_key.clone(), keys.mac_key.clone()));
    }
    Err(Error::ItemKeyMissing)
}

fn emit_padding<W: Write>(outer: &mut SharedStream<W>, prng: &mut Csprng, pad_min: u32, pad_max: u32) -> Result<()> {
    let len = prng.next_int(pad_min, pad_max + 1) as usize;
    let mut pad = vec![0u8; len];
    prng.next_bytes(&mut pad);
    outer.write_all(&pad)?;
    Ok(())
}

/// Read-side counterpart of [`emit_padding`]: must draw exactly the same
/// `next_int`/`next_bytes` calls in the same order to keep the PRNG in sync,
/// then discard that many bytes from the outer stream.
fn skip_padding<R: Read>(outer: &mut SharedStream<R>, prng: &mut Csprng, pad_min: u32, pad_max: u32) -> Result<()> {
    let len = prng.next_int(pad_min, pad_max + 1) as usize;
    let mut unused = vec![0u8; len];
    prng.next_bytes(&mut unused);
    let mut discard = vec![0u8; len];
    outer.read_exact(&mut discard)?;
    Ok(())
}

type WritePipeline<W> = CipherWriteStream<MacWriteStream<SharedStream<W>>>;

fn build_write_pipeline<W: Write>(
    item: &PayloadItem,
    pre_keys: &HashMap<[u8; 16], Vec<u8>>,
    outer: SharedStream<W>,
) -> Result<WritePipeline<W>> {
    let (cipher_key, mac_key) = resolve_item_keys(item, pre_keys)?;
    let mac = MacWriteStream::new(outer, &item.auth_cfg, &mac_key)?;
    CipherWriteStream::new(mac, &item.cipher_cfg, &cipher_key, &item.cipher_cfg.iv)
}

fn finish_write_item<W: Write>(item: &mut PayloadItem, mut pipeline: WritePipeline<W>) -> Result<()> {
    pipeline.finish()?;
    let internal_length = pipeline.bytes_out();
    let mut mac = pipeline.into_inner();
    let authenticatible = item.serialize_authenticatible()?;
    mac.update(&authenticatible)?;
    mac.finish()?;
    item.auth_tag = Some(mac.tag()?.to_vec());
    item.internal_length = internal_length;
    Ok(())
}

/// Drives the write side of the mux to completion: every item's source is
/// read to EOF, encrypted-then-MAC'd, and interleaved into `outer` under
/// PRNG scheduling; `item.auth_tag`/`item.internal_length` are filled in as
/// each item finishes. Returns the outer stream once every pipeline
/// referencing it has been torn down.
pub fn write_items<W: Write>(
    items: &mut [PayloadItem],
    sources: &mut [Box<dyn Read>],
    pre_keys: &HashMap<[u8; 16], Vec<u8>>,
    payload_cfg: &PayloadConfig,
    outer: W,
) -> Result<W> {
    let n = items.len();
    if n == 0 {
        return Err(Error::ConfigInvalid("payload mux requires at least one item"));
    }
    if sources.len() != n {
        return Err(Error::ConfigInvalid("item count and source count disagree"));
    }

    let scheme = MuxScheme::from_payload_config(payload_cfg)?;
    let mut prng = Csprng::seed(&payload_cfg.prng_config)?;
    let mut shared = SharedStream::new(outer);

    let mut pipelines: Vec<Option<WritePipeline<W>>> = (0..n).map(|_| None).collect();
    let mut completed = vec![false; n];
    let mut chunk = vec![0u8; OP_CHUNK_SIZE];

    while let Some(idx) = next_source(&mut prng, &completed) {
        if let MuxScheme::Frameshift { pad_min, pad_max } = scheme {
            emit_padding(&mut shared, &mut prng, pad_min, pad_max)?;
        }
        if pipelines[idx].is_none() {
            pipelines[idx] = Some(build_write_pipeline(&items[idx], pre_keys, shared.clone())?);
        }
        let read = sources[idx].read(&mut chunk)?;
        if read == 0 {
            let pipeline = pipelines[idx].take().expect("pipeline built above");
            finish_write_item(&mut items[idx], pipeline)?;
            completed[idx] = true;
        } else {
            pipelines[idx].as_mut().expect("pipeline built above").write(&chunk[..read])?;
        }
    }

    drop(pipelines);
    shared.into_inner()
}

type ReadPipeline<R> = CipherReadStream<MacReadStream<Take<SharedStream<R>>>>;

fn build_read_pipeline<R: Read>(
    item: &PayloadItem,
    pre_keys: &HashMap<[u8; 16], Vec<u8>>,
    outer: SharedStream<R>,
) -> Result<ReadPipeline<R>> {
    let (cipher_key, mac_key) = resolve_item_keys(item, pre_keys)?;
    let limited = outer.take(item.internal_length);
    let mac = MacReadStream::new(limited, &item.auth_cfg, &mac_key)?;
    CipherReadStream::new(mac, &item.cipher_cfg, &cipher_key, &item.cipher_cfg.iv)
}

fn finish_read_item<R: Read>(item: &mut PayloadItem, pipeline: ReadPipeline<R>) -> Result<()> {
    let mut mac = pipeline.into_inner();
    let authenticatible = item.serialize_authenticatible()?;
    mac.update(&authenticatible)?;
    mac.finish()?;
    let expected = item
        .auth_tag
        .as_deref()
        .ok_or(Error::FormatInvalid("item metadata missing auth tag"))?;
    if !equal_ct(mac.tag()?, expected) {
        return Err(Error::CiphertextAuthentication(AuthScope::PayloadItem));
    }
    Ok(())
}

/// Drives the read side of the mux to completion: exactly
/// `item.internal_length` ciphertext bytes are pulled from `outer` for each
/// item, decrypted-then-verified, and written to that item's sink. Aborts
/// the whole read on the first per-item authentication failure (§7:
/// single-shot trust model). Returns the outer stream once drained.
pub fn read_items<R: Read>(
    items: &mut [PayloadItem],
    sinks: &mut [Box<dyn Write>],
    pre_keys: &HashMap<[u8; 16], Vec<u8>>,
    payload_cfg: &PayloadConfig,
    outer: R,
) -> Result<R> {
    let n = items.len();
    if n == 0 {
        return Err(Error::ConfigInvalid("payload mux requires at least one item"));
    }
    if sinks.len() != n {
        return Err(Error::ConfigInvalid("item count and sink count disagree"));
    }

    let scheme = MuxScheme::from_payload_config(payload_cfg)?;
    let mut prng = Csprng::seed(&payload_cfg.prng_config)?;
    let mut shared = SharedStream::new(outer);

    let mut pipelines: Vec<Option<ReadPipeline<R>>> = (0..n).map(|_| None).collect();
    let mut completed = vec![false; n];
    let mut chunk = vec![0u8; OP_CHUNK_SIZE];

    while let Some(idx) = next_source(&mut prng, &completed) {
        if let MuxScheme::Frameshift { pad_min, pad_max } = scheme {
            skip_padding(&mut shared, &mut prng, pad_min, pad_max)?;
        }
        if pipelines[idx].is_none() {
            pipelines[idx] = Some(build_read_pipeline(&items[idx], pre_keys, shared.clone())?);
        }
        let written = pipelines[idx].as_mut().expect("pipeline built above").read(&mut chunk)?;
        if written == 0 {
            let pipeline = pipelines[idx].take().expect("pipeline built above");
            finish_read_item(&mut items[idx], pipeline)?;
            completed[idx] = true;
        } else {
            sinks[idx].write_all(&chunk[..written])?;
        }
    }

    drop(pipelines);
    shared.into_inner()
}
