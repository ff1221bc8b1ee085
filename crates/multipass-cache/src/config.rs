//! Cache Configuration
//!
//! This module defines configuration for cache writer/reader sessions.
//!
//! ## CacheConfig
//!
//! - **buffer_capacity**: initial arena capacity of the session's stream
//!   buffer (default: 64 KiB; doubles on demand)
//! - **verify_checksum**: accumulate a CRC32 over the cache bytes so callers
//!   can compare writer and reader values (default: off)
//! - **compression**: plain or gzip endpoints (default: plain)
//!
//! ## Usage
//!
//! ```ignore
//! use multipass_cache::{CacheCompression, CacheConfig};
//!
//! // Compressed cache with checksum verification
//! let config = CacheConfig {
//!     compression: CacheCompression::Gzip,
//!     verify_checksum: true,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_CAPACITY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Initial stream buffer capacity in bytes (default: 64 KiB)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Accumulate a CRC32 over cache bytes (default: false)
    #[serde(default)]
    pub verify_checksum: bool,

    /// Endpoint compression (default: none)
    #[serde(default)]
    pub compression: CacheCompression,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            verify_checksum: false,
            compression: CacheCompression::None,
        }
    }
}

/// Compression applied by the cache file endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCompression {
    #[default]
    None,
    Gzip,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_CAPACITY
}
