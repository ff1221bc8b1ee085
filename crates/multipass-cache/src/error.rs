//! Error Types for the Cache Layer
//!
//! This module defines all error types that can occur while reading or
//! writing an example cache.
//!
//! ## Error Categories
//!
//! ### I/O Errors
//! - `Io`: an endpoint read/write failed
//!
//! ### Data Integrity Errors
//! - `CacheTruncated`: a record was started (its length prefix was read) but
//!   a later field came up short; the message names the field
//! - `SignatureMismatch`: a byte-compare read did not match the expected
//!   signature (e.g. the cache file magic)
//! - `UnsupportedVersion`: the cache file was written by a newer format
//! - `Varint`: a feature stream contained a malformed varint
//!
//! ### Usage Errors
//! - `InvalidMode`: read calls on a write buffer or vice versa, or attaching
//!   conflicting endpoints
//! - `ResetUnsupported`: rewind requested but an input endpoint cannot seek
//!   back to its start
//! - `TooManyNamespaces`: the wire format caps an example at 255 namespaces
//!
//! Clean end-of-cache is not an error: the reader reports it as `Ok(false)`.
//!
//! ## Usage
//! All cache operations return `Result<T>`, aliased to `Result<T, Error>`,
//! for `?` propagation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache may be truncated: short read of {0}")]
    CacheTruncated(String),

    #[error("signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("unsupported cache version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid buffer mode: {0}")]
    InvalidMode(String),

    #[error("input endpoint does not support reset")]
    ResetUnsupported,

    #[error("example has {0} namespaces, wire format allows at most 255")]
    TooManyNamespaces(usize),

    #[error("varint error: {0}")]
    Varint(#[from] multipass_core::Error),
}
