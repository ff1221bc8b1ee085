//! MultiPass Cache Layer
//!
//! This crate implements the example cache for the MultiPass online-learning
//! engine - the component that makes repeated passes over a training set
//! fast by serializing parsed examples once and streaming them back on every
//! later pass.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐
//! │ Text parser  │  (external)
//! └──────┬───────┘
//!        │ examples (pass 1)
//!        ▼
//! ┌───────────────────┐
//! │ ExampleWriter     │  record codec
//! │   StreamBuffer    │  arena + cursors
//! │     ByteSink      │  file / memory / gzip
//! └─────────┬─────────┘
//!           │ cache file
//!           ▼
//! ┌───────────────────┐
//! │ ExampleReader     │  (passes 2..n, rewindable)
//! │   StreamBuffer    │
//! │     ByteSource*   │  ordered endpoint chain
//! └─────────┬─────────┘
//!           │ examples
//!           ▼
//! ┌──────────────┐
//! │ Learner      │  (external)
//! └──────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### StreamBuffer
//! One growable byte arena multiplexing reads or writes over ordered
//! endpoints without per-call allocation. Shift-before-grow reclamation,
//! doubling growth, transparent endpoint chaining, optional CRC32
//! accumulation.
//!
//! ### ExampleWriter / ExampleReader
//! The record codec: length-prefixed records carrying an opaque label blob,
//! tag, newline flag, and namespace blocks of delta/zigzag-coded feature
//! entries with value specialization.
//!
//! ### Endpoints
//! `ByteSource`/`ByteSink` implementations over plain files, memory, and
//! gzip-compressed files; compression is invisible above the endpoint seam.
//!
//! ## Concurrency Model
//!
//! Single-threaded and synchronous throughout. A buffer is never shared
//! between threads; each training worker owns its own cache file and buffer.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;

pub use buffer::{StreamBuffer, DEFAULT_CAPACITY};
pub use codec::{
    verify_cache_header, write_cache_header, BlobLabelCodec, ExampleReader, ExampleWriter,
    LabelCodec, CACHE_MAGIC, CACHE_VERSION,
};
pub use config::{CacheCompression, CacheConfig};
pub use endpoint::{
    ByteSink, ByteSource, FileSink, FileSource, GzipFileSink, GzipFileSource, MemorySink,
    MemorySource,
};
pub use error::{Error, Result};
