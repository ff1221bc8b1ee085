//! Error Types for the Core Wire Codecs
//!
//! The numeric codecs in this crate decode bytes that come straight out of a
//! cache file, so malformed input must surface as an error value rather than
//! a panic.
//!
//! ## Error Categories
//!
//! - `TruncatedVarint`: the input ended before the varint's terminal byte
//! - `VarintOverflow`: more continuation bytes than a u64 can hold
//!
//! ## Usage
//!
//! All fallible functions in this crate return `Result<T>`, aliased to
//! `Result<T, Error>`, so callers can propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("varint ended before its terminal byte")]
    TruncatedVarint,

    #[error("varint exceeds 64 bits")]
    VarintOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;
