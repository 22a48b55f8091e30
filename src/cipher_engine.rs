//! CipherEngine (C3): a uniform "operation-sized" byte transform over a
//! stream cipher, or a block cipher composed with a mode and an optional
//! padding scheme.
//!
//! Modes are implemented directly on top of [`KeyedBlockCipher`] rather than
//! pulled from a mode crate: mode composition is in-scope here (§4.2), only
//! the block/stream primitives themselves are pinned external contracts
//! (§6.2).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::primitives::block::KeyedBlockCipher;
use crate::primitives::stream::KeyedStreamCipher;
use crate::primitives::{BlockCipherKind, BlockMode, PaddingKind, PrimitiveRegistry, StreamCipherKind};

/// Serialized cipher configuration, as it travels inside a manifest or
/// payload item. Algorithm identifiers are strings resolved through
/// [`PrimitiveRegistry`]; `iv` is the per-construction IV/nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherCfg {
    pub cipher: String,
    pub mode: Option<String>,
    pub padding: Option<String>,
    pub iv: Vec<u8>,
}

impl CipherCfg {
    pub fn block(cipher: BlockCipherKind, mode: BlockMode, padding: PaddingKind, iv: Vec<u8>) -> Self {
        Self {
            cipher: cipher.name().to_string(),
            mode: Some(mode.name().to_string()),
            padding: Some(padding.name().to_string()),
            iv,
        }
    }

    pub fn stream(cipher: StreamCipherKind, nonce: Vec<u8>) -> Self {
        Self {
            cipher: cipher.name().to_string(),
            mode: None,
            padding: None,
            iv: nonce,
        }
    }

    fn resolve(&self) -> Result<ResolvedCipherCfg> {
        if let Ok(cipher) = PrimitiveRegistry::block_cipher(&self.cipher) {
            let mode_name = self
                .mode
                .as_deref()
                .ok_or(Error::ConfigInvalid("block cipher config missing mode"))?;
            let padding_name = self
                .padding
                .as_deref()
                .ok_or(Error::ConfigInvalid("block cipher config missing padding"))?;
            let mode = PrimitiveRegistry::block_mode(mode_name)?;
            let padding = PrimitiveRegistry::padding(padding_name)?;
            return Ok(ResolvedCipherCfg::Block { cipher, mode, padding });
        }
        if let Ok(cipher) = PrimitiveRegistry::stream_cipher(&self.cipher) {
            return Ok(ResolvedCipherCfg::Stream { cipher });
        }
        Err(Error::ConfigInvalid("unknown cipher identifier"))
    }

    /// The working key length this configuration requires.
    pub fn key_len(&self) -> Result<usize> {
        match self.resolve()? {
            ResolvedCipherCfg::Block { cipher, .. } => Ok(cipher.key_len()),
            ResolvedCipherCfg::Stream { cipher } => Ok(cipher.key_len()),
        }
    }
}

enum ResolvedCipherCfg {
    Block {
        cipher: BlockCipherKind,
        mode: BlockMode,
        padding: PaddingKind,
    },
    Stream {
        cipher: StreamCipherKind,
    },
}

/// Held-back ciphertext-stealing state for CTS-CBC. Encryption holds the
/// most recent full ciphertext block back (it may need to be recombined
/// with a following partial block); decryption holds the most recent full
/// ciphertext block back along with the chain value that was current when
/// it arrived.
enum CtsHeld {
    Encrypt([u8; 16]),
    Decrypt { block: [u8; 16], chain: [u8; 16] },
}

enum ModeState {
    Ctr { counter: [u8; 16] },
    Cfb { register: [u8; 16] },
    Ofb { register: [u8; 16] },
    Cbc { chain: [u8; 16], held: Option<[u8; 16]> },
    CtsCbc { chain: [u8; 16], held: Option<CtsHeld> },
}

fn increment_counter(counter: &mut [u8; 16]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

fn xor_in_place(buf: &mut [u8], other: &[u8]) {
    for (b, o) in buf.iter_mut().zip(other.iter()) {
        *b ^= o;
    }
}

pub struct BlockEngine {
    cipher: KeyedBlockCipher,
    mode: BlockMode,
    padding: PaddingKind,
    encrypt: bool,
    state: ModeState,
    finished: bool,
}

impl BlockEngine {
    fn new(
        cipher_kind: BlockCipherKind,
        mode: BlockMode,
        padding: PaddingKind,
        encrypt: bool,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self> {
        if mode.is_aead() {
            return Err(Error::ConfigInvalid(
                "AEAD block modes are not permitted inside a CipherStream",
            ));
        }
        if mode.requires_padding() && matches!(padding, PaddingKind::None) {
            return Err(Error::ConfigInvalid(
                "mode requires a padding scheme but padding is None",
            ));
        }
        if !mode.requires_padding() && matches!(padding, PaddingKind::Pkcs7) {
            return Err(Error::ConfigInvalid(
                "padding configured for a mode that streams its own trailing block",
            ));
        }
        let iv: [u8; 16] = iv
            .try_into()
            .map_err(|_| Error::ConfigInvalid("block cipher IV must be exactly 16 bytes"))?;
        let cipher = KeyedBlockCipher::new(cipher_kind, key)?;
        let state = match mode {
            BlockMode::Ctr => ModeState::Ctr { counter: iv },
            BlockMode::Cfb => ModeState::Cfb { register: iv },
            BlockMode::Ofb => ModeState::Ofb { register: iv },
            BlockMode::Cbc => ModeState::Cbc { chain: iv, held: None },
            BlockMode::CtsCbc => ModeState::CtsCbc { chain: iv, held: None },
            BlockMode::Gcm | BlockMode::Eax => unreachable!("rejected above"),
        };
        Ok(Self {
            cipher,
            mode,
            padding,
            encrypt,
            state,
            finished: false,
        })
    }

    pub const OPERATION_SIZE: usize = 16;

    /// Processes exactly one full 16-byte block, writing 16 bytes to `output`.
    pub fn process(&mut self, input: &[u8; 16], output: &mut [u8]) -> Result<usize> {
        if self.finished {
            return Err(Error::ConfigInvalid("cipher engine already finished"));
        }
        match &mut self.state {
            ModeState::Ctr { counter } => {
                let mut keystream = *counter;
                self.cipher.encrypt_block(&mut keystream);
                increment_counter(counter);
                let mut block = *input;
                xor_in_place(&mut block, &keystream);
                output[..16].copy_from_slice(&block);
            }
            ModeState::Cfb { register } => {
                let mut keystream = *register;
                self.cipher.encrypt_block(&mut keystream);
                let mut block = *input;
                xor_in_place(&mut block, &keystream);
                *register = if self.encrypt { block } else { *input };
                output[..16].copy_from_slice(&block);
            }
            ModeState::Ofb { register } => {
                self.cipher.encrypt_block(register);
                let mut block = *input;
                xor_in_place(&mut block, register);
                output[..16].copy_from_slice(&block);
            }
            ModeState::Cbc { chain, held } => {
                if self.encrypt {
                    let mut block = *input;
                    xor_in_place(&mut block, chain);
                    self.cipher.encrypt_block(&mut block);
                    *chain = block;
                    output[..16].copy_from_slice(&block);
                } else {
                    // The last ciphertext block cannot be unpadded until we
                    // know it is last, so decryption always holds the most
                    // recently decrypted block back by one step.
                    let mut block = *input;
                    self.cipher.decrypt_block(&mut block);
                    xor_in_place(&mut block, chain);
                    *chain = *input;
                    if let Some(prev) = held.take() {
                        output[..16].copy_from_slice(&prev);
                        *held = Some(block);
                        return Ok(16);
                    }
                    *held = Some(block);
                    return Ok(0);
                }
            }
            ModeState::CtsCbc { chain, held } => {
                if self.encrypt {
                    let mut block = *input;
                    xor_in_place(&mut block, chain);
                    self.cipher.encrypt_block(&mut block);
                    *chain = block;
                    if let Some(CtsHeld::Encrypt(prev)) = held.take() {
                        output[..16].copy_from_slice(&prev);
                        *held = Some(CtsHeld::Encrypt(block));
                        return Ok(16);
                    }
                    *held = Some(CtsHeld::Encrypt(block));
                    return Ok(0);
                } else {
                    let prev_chain = *chain;
                    *chain = *input;
                    if let Some(CtsHeld::Decrypt { block: prev, chain: prev_chain2 }) = held.take() {
                        let mut out_block = prev;
                        self.cipher.decrypt_block(&mut out_block);
                        xor_in_place(&mut out_block, &prev_chain2);
                        output[..16].copy_from_slice(&out_block);
                        *held = Some(CtsHeld::Decrypt {
                            block: *input,
                            chain: prev_chain,
                        });
                        return Ok(16);
                    }
                    *held = Some(CtsHeld::Decrypt {
                        block: *input,
                        chain: prev_chain,
                    });
                    return Ok(0);
                }
            }
        }
        Ok(16)
    }

    /// Processes the final, possibly partial, trailing input (`0..16`
    /// bytes) and appends whatever output this produces to `output`.
    pub fn process_final(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        if self.finished {
            return Err(Error::ConfigInvalid("cipher engine already finished"));
        }
        self.finished = true;
        match &mut self.state {
            ModeState::Ctr { counter } => {
                if !input.is_empty() {
                    let mut keystream = *counter;
                    self.cipher.encrypt_block(&mut keystream);
                    let mut tail = input.to_vec();
                    xor_in_place(&mut tail, &keystream[..input.len()]);
                    output.extend_from_slice(&tail);
                }
                Ok(())
            }
            ModeState::Cfb { register } => {
                if !input.is_empty() {
                    let mut keystream = *register;
                    self.cipher.encrypt_block(&mut keystream);
                    let mut tail = input.to_vec();
                    xor_in_place(&mut tail, &keystream[..input.len()]);
                    output.extend_from_slice(&tail);
                }
                Ok(())
            }
            ModeState::Ofb { register } => {
                if !input.is_empty() {
                    self.cipher.encrypt_block(register);
                    let mut tail = input.to_vec();
                    xor_in_place(&mut tail, &register[..input.len()]);
                    output.extend_from_slice(&tail);
                }
                Ok(())
            }
            ModeState::Cbc { chain, held } => {
                if self.encrypt {
                    let padded = pad_pkcs7(input, self.padding)?;
                    let mut block = [0u8; 16];
                    block.copy_from_slice(&padded);
                    xor_in_place(&mut block, chain);
                    self.cipher.encrypt_block(&mut block);
                    output.extend_from_slice(&block);
                } else {
                    if !input.is_empty() {
                        return Err(Error::IncompleteBlock);
                    }
                    let last = held.take().ok_or(Error::IncompleteBlock)?;
                    output.extend_from_slice(&unpad_pkcs7(&last)?);
                }
                Ok(())
            }
            ModeState::CtsCbc { chain, held } => match held.take() {
                None => {
                    if !input.is_empty() {
                        return Err(Error::IncompleteBlock);
                    }
                    Ok(())
                }
                Some(CtsHeld::Encrypt(c_prev)) => {
                    if input.is_empty() {
                        output.extend_from_slice(&c_prev);
                        return Ok(());
                    }
                    let r = input.len();
                    let mut padded = [0u8; 16];
                    padded[..r].copy_from_slice(input);
                    xor_in_place(&mut padded, &c_prev);
                    self.cipher.encrypt_block(&mut padded);
                    output.extend_from_slice(&padded);
                    output.extend_from_slice(&c_prev[..r]);
                    Ok(())
                }
                Some(CtsHeld::Decrypt { block: c_prev, chain: prev_chain }) => {
                    if input.is_empty() {
                        let mut p = c_prev;
                        self.cipher.decrypt_block(&mut p);
                        xor_in_place(&mut p, &prev_chain);
                        output.extend_from_slice(&p);
                        return Ok(());
                    }
                    let r = input.len();
                    let mut d_prev_full = c_prev;
                    self.cipher.decrypt_block(&mut d_prev_full);
                    let mut c_star = [0u8; 16];
                    c_star[..r].copy_from_slice(input);
                    c_star[r..].copy_from_slice(&d_prev_full[r..]);
                    let mut p_n_padded = d_prev_full;
                    xor_in_place(&mut p_n_padded, &c_star);
                    let mut d_cstar = c_star;
                    self.cipher.decrypt_block(&mut d_cstar);
                    xor_in_place(&mut d_cstar, &prev_chain);
                    *chain = c_star; // unused further, kept for symmetry
                    output.extend_from_slice(&d_cstar);
                    output.extend_from_slice(&p_n_padded[..r]);
                    Ok(())
                }
            },
        }
    }
}

fn pad_pkcs7(input: &[u8], padding: PaddingKind) -> Result<[u8; 16]> {
    if !matches!(padding, PaddingKind::Pkcs7) {
        return Err(Error::ConfigInvalid("final partial block requires PKCS7 padding"));
    }
    if input.len() >= 16 {
        return Err(Error::ConfigInvalid("padding input must be shorter than one block"));
    }
    let pad_len = 16 - input.len();
    let mut block = [0u8; 16];
    block[..input.len()].copy_from_slice(input);
    for b in block[input.len()..].iter_mut() {
        *b = pad_len as u8;
    }
    Ok(block)
}

fn unpad_pkcs7(block: &[u8; 16]) -> Result<Vec<u8>> {
    let pad_len = *block.last().unwrap() as usize;
    if pad_len == 0 || pad_len > 16 {
        return Err(Error::PaddingCorrupt);
    }
    let data_len = 16 - pad_len;
    if block[data_len..].iter().any(|&b| b as usize != pad_len) {
        return Err(Error::PaddingCorrupt);
    }
    Ok(block[..data_len].to_vec())
}

pub struct StreamEngine {
    cipher: KeyedStreamCipher,
    finished: bool,
}

impl StreamEngine {
    fn new(kind: StreamCipherKind, key: &[u8], nonce: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: KeyedStreamCipher::new(kind, key, nonce)?,
            finished: false,
        })
    }
}

/// CipherEngine (C3): dispatches to a block-mode or stream-cipher
/// implementation behind a uniform operation-sized interface.
pub enum CipherEngine {
    Block(BlockEngine),
    Stream(StreamEngine),
}

impl CipherEngine {
    pub fn new(cfg: &CipherCfg, encrypt: bool, key: &[u8], iv: &[u8]) -> Result<Self> {
        match cfg.resolve()? {
            ResolvedCipherCfg::Block { cipher, mode, padding } => Ok(Self::Block(BlockEngine::new(
                cipher, mode, padding, encrypt, key, iv,
            )?)),
            ResolvedCipherCfg::Stream { cipher } => {
                Ok(Self::Stream(StreamEngine::new(cipher, key, iv)?))
            }
        }
    }

    pub fn operation_size(&self) -> usize {
        match self {
            Self::Block(_) => BlockEngine::OPERATION_SIZE,
            Self::Stream(s) => match &s.cipher {
                KeyedStreamCipher::ChaCha20(_) => StreamCipherKind::ChaCha20.operation_size(),
                KeyedStreamCipher::XSalsa20(_) => StreamCipherKind::XSalsa20.operation_size(),
            },
        }
    }

    /// Processes exactly one operation-sized chunk of `input`, writing the
    /// transformed bytes into `output` (at least `operation_size()` long).
    /// Returns the number of bytes written.
    pub fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match self {
            Self::Block(b) => {
                let block: &[u8; 16] = input
                    .try_into()
                    .map_err(|_| Error::ConfigInvalid("block engine requires a full block"))?;
                b.process(block, output)
            }
            Self::Stream(s) => {
                if s.finished {
                    return Err(Error::ConfigInvalid("cipher engine already finished"));
                }
                output[..input.len()].copy_from_slice(input);
                s.cipher.process(&mut output[..input.len()]);
                Ok(input.len())
            }
        }
    }

    /// Finalizes the engine with whatever trailing bytes remain (possibly
    /// empty), appending the result to `output`. Idempotent calls past the
    /// first are rejected by the engine's internal `finished` flag.
    pub fn process_final(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Block(b) => b.process_final(input, output),
            Self::Stream(s) => {
                if s.finished {
                    return Err(Error::ConfigInvalid("cipher engine already finished"));
                }
                s.finished = true;
                if !input.is_empty() {
                    let mut tail = input.to_vec();
                    s.cipher.process(&mut tail);
                    output.extend_from_slice(&tail);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::BlockCipherKind as BC;

    fn roundtrip_block(mode: BlockMode, padding: PaddingKind, plaintext: &[u8]) {
        let key = [0x11u8; 32];
        let iv = [0x22u8; 16];
        let cfg = CipherCfg::block(BC::Aes256, mode, padding, iv.to_vec());

        let mut enc = CipherEngine::new(&cfg, true, &key, &iv).unwrap();
        let mut ciphertext = Vec::new();
        let op = enc.operation_size();
        let mut chunks = plaintext.chunks_exact(op);
        for chunk in &mut chunks {
            let mut out = vec![0u8; op];
            let n = enc.process(chunk, &mut out).unwrap();
            ciphertext.extend_from_slice(&out[..n]);
        }
        enc.process_final(chunks.remainder(), &mut ciphertext).unwrap();

        let mut dec = CipherEngine::new(&cfg, false, &key, &iv).unwrap();
        let mut recovered = Vec::new();
        let mut dec_chunks = ciphertext.chunks_exact(op);
        for chunk in &mut dec_chunks {
            let mut out = vec![0u8; op];
            let n = dec.process(chunk, &mut out).unwrap();
            recovered.extend_from_slice(&out[..n]);
        }
        dec.process_final(dec_chunks.remainder(), &mut recovered).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn ctr_roundtrips_arbitrary_length() {
        roundtrip_block(BlockMode::Ctr, PaddingKind::None, b"a message that is not block aligned!!");
    }

    #[test]
    fn cfb_roundtrips_arbitrary_length() {
        roundtrip_block(BlockMode::Cfb, PaddingKind::None, b"another odd-length message.");
    }

    #[test]
    fn ofb_roundtrips_arbitrary_length() {
        roundtrip_block(BlockMode::Ofb, PaddingKind::None, b"yet another odd length message!");
    }

    #[test]
    fn cbc_roundtrips_with_padding() {
        roundtrip_block(BlockMode::Cbc, PaddingKind::Pkcs7, b"exactly sixteen!padded remainder");
    }

    #[test]
    fn cts_cbc_roundtrips_partial_final_block() {
        roundtrip_block(
            BlockMode::CtsCbc,
            PaddingKind::None,
            b"sixteen byte one block two three",
        );
    }

    #[test]
    fn cts_cbc_roundtrips_exact_multiple() {
        roundtrip_block(BlockMode::CtsCbc, PaddingKind::None, b"two full blocks!two full blocks!");
    }

    #[test]
    fn stream_cipher_roundtrips() {
        let key = [3u8; 32];
        let nonce = [4u8; 12];
        let cfg = CipherCfg::stream(StreamCipherKind::ChaCha20, nonce.to_vec());
        let mut enc = CipherEngine::new(&cfg, true, &key, &nonce).unwrap();
        let mut ciphertext = Vec::new();
        enc.process_final(b"an odd length input", &mut ciphertext).unwrap();

        let mut dec = CipherEngine::new(&cfg, false, &key, &nonce).unwrap();
        let mut recovered = Vec::new();
        dec.process_final(&ciphertext, &mut recovered).unwrap();
        assert_eq!(recovered, b"an odd length input");
    }

    #[test]
    fn aead_mode_rejected() {
        let key = [0u8; 32];
        let iv = [0u8; 16];
        let cfg = CipherCfg::block(BC::Aes256, BlockMode::Gcm, PaddingKind::None, iv.to_vec());
        assert!(matches!(
            CipherEngine::new(&cfg, true, &key, &iv),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn cbc_without_padding_rejected() {
        let key = [0u8; 32];
        let iv = [0u8; 16];
        let cfg = CipherCfg::block(BC::Aes256, BlockMode::Cbc, PaddingKind::None, iv.to_vec());
        assert!(matches!(
            CipherEngine::new(&cfg, true, &key, &iv),
            Err(Error::ConfigInvalid(_))
        ));
    }
}
