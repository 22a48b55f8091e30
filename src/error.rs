//! Unified error type for the package read/write pipeline.
//!
//! Every fatal condition the package pipeline can hit surfaces as one of the
//! variants below. Display messages intentionally stop at "manifest" vs.
//! "payload item" granularity — never a byte offset, item identifier, or
//! field name — so a failure cannot be used as an oracle.

use core::fmt;

/// Which half of the package a `CiphertextAuthentication` failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    Manifest,
    PayloadItem,
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest => write!(f, "manifest"),
            Self::PayloadItem => write!(f, "payload item"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// A configuration cannot produce a well-defined pipeline: unknown
    /// scheme name, missing required field, unpadded mode fed a non-multiple
    /// of the operation size, AEAD requested inside a `CipherStream`,
    /// mismatched curves in key agreement, or KDF parameters out of policy.
    ConfigInvalid(&'static str),
    /// Magic tag mismatch, truncated length field, or a declared length that
    /// exceeds the remaining stream.
    FormatInvalid(&'static str),
    /// An item carries neither embedded keys nor a resolvable pre-key.
    ItemKeyMissing,
    /// A computed MAC differs from the stored tag, at the stated granularity.
    CiphertextAuthentication(AuthScope),
    /// End of stream encountered mid-operation in a non-streamable mode.
    IncompleteBlock,
    /// Final-block padding did not parse under the configured padding scheme.
    PaddingCorrupt,
    /// A declared external/internal length disagreed with bytes observed.
    LengthMismatch,
    /// Passthrough of an underlying-stream failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::FormatInvalid(msg) => write!(f, "invalid package format: {msg}"),
            Self::ItemKeyMissing => write!(f, "item has no resolvable cipher/auth key"),
            Self::CiphertextAuthentication(scope) => {
                write!(f, "{scope} failed authentication")
            }
            Self::IncompleteBlock => write!(f, "stream ended mid-operation"),
            Self::PaddingCorrupt => write!(f, "padding did not parse"),
            Self::LengthMismatch => write!(f, "declared length disagrees with observed bytes"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
