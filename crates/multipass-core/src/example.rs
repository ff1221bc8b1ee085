//! Example Data Structure
//!
//! This module defines the `Example` type - the unit of data flowing through
//! the MultiPass training engine.
//!
//! ## What is an Example?
//! One training example as the cache codec sees it:
//! - A sparse feature vector partitioned into namespaces
//! - A label blob the codec carries but never interprets
//! - A tag (caller-visible identifier bytes) and a newline flag
//!
//! ## Structure
//! - **label**: opaque pre-encoded label bytes; the label subsystem owns the
//!   format and reports its own length on the wire
//! - **tag**: arbitrary identifier bytes, often empty
//! - **newline**: whether this example is the blank-line separator the text
//!   format uses between multiline examples
//! - **namespaces**: up to 255 namespaces, each an index byte plus an ordered
//!   feature list
//! - **sorted**: set by the cache reader; false when any namespace decoded a
//!   negative index delta. Scoped to the one example it was decoded into.
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for label/tag so slices of a parse buffer can be
//!   carried without copying
//! - `f32` feature values match the wire format's 4-byte value slot
//! - The example object is caller-owned and reusable: `clear()` resets it for
//!   the next record without dropping allocations

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One feature: a hashed index and its value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Hashed feature index (already masked by the caller's bit mask)
    pub index: u64,

    /// Feature value
    pub value: f32,
}

impl Feature {
    pub fn new(index: u64, value: f32) -> Self {
        Self { index, value }
    }
}

/// A named partition of an example's features.
///
/// The codec only needs the partition's index byte and its ordered feature
/// list; namespace names live in the (external) text parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace index byte
    pub index: u8,

    /// Features in their original order
    pub features: Vec<Feature>,
}

impl Namespace {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            features: Vec::new(),
        }
    }

    pub fn with_features(index: u8, features: Vec<Feature>) -> Self {
        Self { index, features }
    }
}

/// A single training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Opaque label blob (written/read by the label subsystem)
    pub label: Bytes,

    /// Tag bytes
    pub tag: Bytes,

    /// Newline-separator flag
    pub newline: bool,

    /// Namespaces in iteration order
    pub namespaces: Vec<Namespace>,

    /// False when decoding saw a negative index delta in any namespace of
    /// this example
    pub sorted: bool,
}

impl Example {
    pub fn new() -> Self {
        Self {
            label: Bytes::new(),
            tag: Bytes::new(),
            newline: false,
            namespaces: Vec::new(),
            sorted: true,
        }
    }

    /// Reset for reuse across records. Keeps the namespace allocation.
    pub fn clear(&mut self) {
        self.label = Bytes::new();
        self.tag = Bytes::new();
        self.newline = false;
        self.namespaces.clear();
        self.sorted = true;
    }

    /// Total feature count across all namespaces.
    pub fn num_features(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.features.len()).sum()
    }

    /// Estimate the in-memory size of this example in bytes.
    pub fn estimated_size(&self) -> usize {
        self.label.len()
            + self.tag.len()
            + self
                .namespaces
                .iter()
                .map(|ns| 1 + ns.features.len() * std::mem::size_of::<Feature>())
                .sum::<usize>()
    }
}

impl Default for Example {
    fn default() -> Self {
        Self::new()
    }
}
