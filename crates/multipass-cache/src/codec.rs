//! Example Record Codec - The Cache Wire Format
//!
//! This module implements `ExampleWriter` and `ExampleReader`, which turn a
//! parsed [`Example`] into one compact binary record and back. A training
//! loop writes each example once (pass 1) into a cache file; every later
//! pass reads the records back byte-identically without re-running the text
//! parser.
//!
//! ## Record Layout
//!
//! ```text
//! record        := length:u64 LE , label_blob , tag_block ,
//!                  newline_flag:u8 , ns_count:u8 , namespace_block*ns_count
//! tag_block     := tag_len:u64 LE , tag_bytes
//! namespace_block := ns_index:u8 , storage_len:u64 LE , feature_entry*
//! feature_entry := varint(header) [ , raw_value:f32 LE ]
//! ```
//!
//! Records are simply concatenated; there is no per-record version marker.
//! A cache *file* starts with a 4-byte magic signature and a u16 format
//! version, written once by the writer session and verified by the reader.
//!
//! ## Feature Entry Encoding
//!
//! Feature indices within a namespace are delta-coded against the previous
//! masked index (starting from 0 per namespace), zigzag-mapped, then packed
//! above two value-specialization bits:
//!
//! - value `1.0`  → `varint(zigzag(delta) << 2)`
//! - value `-1.0` → `varint(zigzag(delta) << 2 | 0b01)`
//! - anything else → `varint(zigzag(delta) << 2 | 0b10)` followed by the
//!   value as 4 raw little-endian IEEE-754 bytes
//!
//! The `storage_len` field is reserved as 8 bytes when a namespace block
//! starts and backfilled once its features are written; the decoder derives
//! the entry count from it rather than storing one.
//!
//! ## Label Seam
//!
//! The label blob is opaque here. An external [`LabelCodec`] appends it
//! during record assembly and consumes it during decode, reporting its own
//! length both ways. [`BlobLabelCodec`] is the default length-prefixed
//! implementation.
//!
//! ## End of Cache vs. Corruption
//!
//! Failing to read the 8-byte length prefix is the clean end-of-cache
//! signal (`Ok(false)`). Once the prefix has been read the record is
//! committed: any later short read - label, tag, namespace index, feature
//! block - is a fatal `CacheTruncated` error. The length value itself is
//! never used to validate or skip a record.

use bytes::{BufMut, Bytes, BytesMut};
use std::path::Path;
use tracing::{debug, info};

use multipass_core::varint::{decode_varint_u64, encode_varint_u64, zigzag_decode, zigzag_encode};
use multipass_core::{Example, Feature, Namespace};

use crate::buffer::StreamBuffer;
use crate::config::{CacheCompression, CacheConfig};
use crate::endpoint::{ByteSink, ByteSource, FileSink, FileSource, GzipFileSink, GzipFileSource};
use crate::error::{Error, Result};

/// Magic bytes opening every cache file: "MPCF"
pub const CACHE_MAGIC: [u8; 4] = *b"MPCF";

/// Version number for the cache format
pub const CACHE_VERSION: u16 = 1;

/// Newline-flag sentinel values
const NEWLINE_EXAMPLE: u8 = 1;
const REGULAR_EXAMPLE: u8 = 0;

/// Value-specialization bits in the feature entry header
const VALUE_NEG_ONE: u64 = 0b01;
const VALUE_GENERAL: u64 = 0b10;

/// The wire format stores the namespace count in one byte.
const MAX_NAMESPACES: usize = u8::MAX as usize;

// ============================================================================
// Label seam
// ============================================================================

/// Externally supplied label blob codec.
///
/// The record codec never interprets label bytes; it only requires that the
/// label codec report how many bytes it produced or consumed.
pub trait LabelCodec {
    /// Append the label blob for `example` to the record under assembly.
    /// Returns the number of bytes appended.
    fn write_label(&mut self, example: &Example, dst: &mut BytesMut) -> usize;

    /// Consume the label blob from the buffer into `example`. Returns the
    /// number of bytes consumed; 0 means the blob could not be started.
    fn read_label(&mut self, example: &mut Example, buf: &mut StreamBuffer) -> Result<usize>;
}

/// Default label codec: a little-endian u64 length followed by the raw
/// pre-encoded label bytes carried on [`Example::label`].
#[derive(Debug, Default)]
pub struct BlobLabelCodec;

impl LabelCodec for BlobLabelCodec {
    fn write_label(&mut self, example: &Example, dst: &mut BytesMut) -> usize {
        dst.put_u64_le(example.label.len() as u64);
        dst.put_slice(&example.label);
        8 + example.label.len()
    }

    fn read_label(&mut self, example: &mut Example, buf: &mut StreamBuffer) -> Result<usize> {
        let mut len_bytes = [0u8; 8];
        if buf.fixed_read(&mut len_bytes, None)? < 8 {
            return Ok(0);
        }
        let len = u64::from_le_bytes(len_bytes) as usize;
        // Accumulate as bytes arrive; a corrupt length hits truncation
        // instead of a huge allocation.
        let mut blob = Vec::new();
        while blob.len() < len {
            let chunk = buf.read_region(len - blob.len())?;
            if chunk.is_empty() {
                return Err(Error::CacheTruncated("label blob".into()));
            }
            blob.extend_from_slice(chunk);
        }
        example.label = Bytes::from(blob);
        Ok(8 + len)
    }
}

// ============================================================================
// Cache file header
// ============================================================================

/// Write the cache file signature (magic + format version).
pub fn write_cache_header(buf: &mut StreamBuffer) -> Result<()> {
    buf.fixed_write(&CACHE_MAGIC)?;
    buf.fixed_write(&CACHE_VERSION.to_le_bytes())?;
    Ok(())
}

/// Verify the cache file signature, consuming it.
pub fn verify_cache_header(buf: &mut StreamBuffer) -> Result<()> {
    let mut magic = CACHE_MAGIC;
    if buf.fixed_read(&mut magic, Some("cache file magic"))? < magic.len() {
        return Err(Error::CacheTruncated("cache file magic".into()));
    }
    let mut version_bytes = [0u8; 2];
    if buf.fixed_read(&mut version_bytes, None)? < 2 {
        return Err(Error::CacheTruncated("cache version".into()));
    }
    let version = u16::from_le_bytes(version_bytes);
    if version != CACHE_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(())
}

// ============================================================================
// Writer
// ============================================================================

/// Serializes examples into a cache stream.
pub struct ExampleWriter<L: LabelCodec> {
    /// Destination buffer (write mode)
    buf: StreamBuffer,

    /// Label blob codec
    label: L,

    /// Feature-index bit mask for this session. Must match the reading
    /// session's mask for the cache to be usable.
    mask: u64,

    /// Record assembly area, reused across examples
    scratch: BytesMut,

    /// Number of examples written
    examples_written: u64,
}

impl<L: LabelCodec> ExampleWriter<L> {
    /// Wrap an existing write-mode buffer. No file header is written; use
    /// [`create`](Self::create) for on-disk caches.
    pub fn new(buf: StreamBuffer, label: L, mask: u64) -> Self {
        Self {
            buf,
            label,
            mask,
            scratch: BytesMut::new(),
            examples_written: 0,
        }
    }

    /// Create a cache file at `path` per `config` and write its header.
    pub fn create(
        path: impl AsRef<Path>,
        config: &CacheConfig,
        label: L,
        mask: u64,
    ) -> Result<Self> {
        let sink: Box<dyn ByteSink> = match config.compression {
            CacheCompression::None => Box::new(FileSink::create(&path)?),
            CacheCompression::Gzip => Box::new(GzipFileSink::create(&path)?),
        };
        let mut buf = StreamBuffer::with_capacity(config.buffer_capacity);
        buf.set_sink(sink)?;
        buf.verify_checksum(config.verify_checksum);
        write_cache_header(&mut buf)?;
        debug!(path = %path.as_ref().display(), "created cache file");
        Ok(Self::new(buf, label, mask))
    }

    /// Serialize one example and append it to the cache.
    pub fn write_example(&mut self, example: &Example) -> Result<()> {
        if example.namespaces.len() > MAX_NAMESPACES {
            return Err(Error::TooManyNamespaces(example.namespaces.len()));
        }

        self.scratch.clear();
        self.label.write_label(example, &mut self.scratch);

        // Tag block
        self.scratch.put_u64_le(example.tag.len() as u64);
        self.scratch.put_slice(&example.tag);

        self.scratch.put_u8(if example.newline {
            NEWLINE_EXAMPLE
        } else {
            REGULAR_EXAMPLE
        });
        self.scratch.put_u8(example.namespaces.len() as u8);

        for ns in &example.namespaces {
            self.scratch.put_u8(ns.index);

            // Reserve storage_len, backfilled once the features are written.
            let len_at = self.scratch.len();
            self.scratch.put_u64_le(0);
            let entries_start = self.scratch.len();

            let mut last: u64 = 0;
            for feature in &ns.features {
                let masked = feature.index & self.mask;
                let delta = masked.wrapping_sub(last) as i64;
                last = masked;

                let header = zigzag_encode(delta) << 2;
                if feature.value == 1.0 {
                    encode_varint_u64(&mut self.scratch, header);
                } else if feature.value == -1.0 {
                    encode_varint_u64(&mut self.scratch, header | VALUE_NEG_ONE);
                } else {
                    encode_varint_u64(&mut self.scratch, header | VALUE_GENERAL);
                    self.scratch.put_f32_le(feature.value);
                }
            }

            let storage = (self.scratch.len() - entries_start) as u64;
            self.scratch[len_at..len_at + 8].copy_from_slice(&storage.to_le_bytes());
        }

        // Wrap the assembled record with its length prefix.
        self.buf
            .fixed_write(&(self.scratch.len() as u64).to_le_bytes())?;
        self.buf.fixed_write(&self.scratch)?;

        self.examples_written += 1;
        Ok(())
    }

    /// Flush buffered records to the endpoint.
    pub fn flush(&mut self) -> Result<()> {
        self.buf.flush()
    }

    /// Flush, finalize the endpoint, and return the accumulated checksum
    /// (0 when checksumming was disabled).
    pub fn close(mut self) -> Result<u32> {
        self.buf.close()?;
        info!(examples = self.examples_written, "cache writer closed");
        Ok(self.buf.checksum_value())
    }

    /// Number of examples written so far.
    pub fn examples_written(&self) -> u64 {
        self.examples_written
    }

    /// Checksum accumulated over flushed bytes so far.
    pub fn checksum(&self) -> u32 {
        self.buf.checksum_value()
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Deserializes examples from a cache stream.
pub struct ExampleReader<L: LabelCodec> {
    /// Source buffer (read mode)
    buf: StreamBuffer,

    /// Label blob codec
    label: L,

    /// Feature-block staging area, reused across records
    scratch: Vec<u8>,

    /// Whether the stream began with a cache file header (re-verified on
    /// rewind)
    has_header: bool,

    /// Number of examples read
    examples_read: u64,
}

impl<L: LabelCodec> std::fmt::Debug for ExampleReader<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleReader")
            .field("has_header", &self.has_header)
            .field("examples_read", &self.examples_read)
            .finish_non_exhaustive()
    }
}

impl<L: LabelCodec> ExampleReader<L> {
    /// Wrap an existing read-mode buffer carrying a headerless record
    /// stream.
    pub fn new(buf: StreamBuffer, label: L) -> Self {
        Self {
            buf,
            label,
            scratch: Vec::new(),
            has_header: false,
            examples_read: 0,
        }
    }

    /// Open the cache file at `path` per `config` and verify its header.
    pub fn open(path: impl AsRef<Path>, config: &CacheConfig, label: L) -> Result<Self> {
        let source: Box<dyn ByteSource> = match config.compression {
            CacheCompression::None => Box::new(FileSource::open(&path)?),
            CacheCompression::Gzip => Box::new(GzipFileSource::open(&path)?),
        };
        let mut buf = StreamBuffer::with_capacity(config.buffer_capacity);
        buf.add_source(source)?;
        buf.verify_checksum(config.verify_checksum);
        verify_cache_header(&mut buf)?;
        debug!(path = %path.as_ref().display(), "opened cache file");
        let mut reader = Self::new(buf, label);
        reader.has_header = true;
        Ok(reader)
    }

    /// Decode the next record into `example`.
    ///
    /// Returns `Ok(false)` at clean end of cache - the 8-byte length prefix
    /// could not be read. Any later short read is a `CacheTruncated` error.
    pub fn read_example(&mut self, example: &mut Example) -> Result<bool> {
        example.clear();

        let mut prefix = [0u8; 8];
        if self.buf.fixed_read(&mut prefix, None)? < 8 {
            debug!(examples = self.examples_read, "end of cache");
            return Ok(false);
        }
        // The prefix value only signals that another record exists; it is
        // not used to validate or skip the record body.
        let _record_len = u64::from_le_bytes(prefix);

        if self.label.read_label(example, &mut self.buf)? == 0 {
            return Err(Error::CacheTruncated("label".into()));
        }

        // Tag block
        let tag_len = self.read_u64("tag length")? as usize;
        if tag_len > 0 {
            self.fill_scratch(tag_len, "tag")?;
            example.tag = Bytes::copy_from_slice(&self.scratch);
        }

        example.newline = self.read_u8("newline flag")? == NEWLINE_EXAMPLE;
        let ns_count = self.read_u8("namespace count")?;

        for _ in 0..ns_count {
            let ns_index = self.read_u8("namespace index")?;
            let storage_len = self.read_u64("feature block length")? as usize;
            self.fill_scratch(storage_len, "feature block")?;

            let mut ns = Namespace::new(ns_index);
            decode_feature_block(&self.scratch, &mut ns.features, &mut example.sorted)?;
            example.namespaces.push(ns);
        }

        self.examples_read += 1;
        Ok(true)
    }

    /// Rewind every input endpoint for another pass over the cache.
    pub fn rewind(&mut self) -> Result<()> {
        self.buf.reset()?;
        if self.has_header {
            verify_cache_header(&mut self.buf)?;
        }
        self.examples_read = 0;
        Ok(())
    }

    /// Whether the underlying endpoints support another pass.
    pub fn supports_rewind(&self) -> bool {
        self.buf.supports_reset()
    }

    /// Number of examples read in the current pass.
    pub fn examples_read(&self) -> u64 {
        self.examples_read
    }

    /// Checksum accumulated over consumed bytes so far.
    pub fn checksum(&self) -> u32 {
        self.buf.checksum_value()
    }

    fn read_u8(&mut self, field: &str) -> Result<u8> {
        let mut byte = [0u8; 1];
        if self.buf.fixed_read(&mut byte, None)? < 1 {
            return Err(Error::CacheTruncated(field.into()));
        }
        Ok(byte[0])
    }

    fn read_u64(&mut self, field: &str) -> Result<u64> {
        let mut bytes = [0u8; 8];
        if self.buf.fixed_read(&mut bytes, None)? < 8 {
            return Err(Error::CacheTruncated(field.into()));
        }
        Ok(u64::from_le_bytes(bytes))
    }

    /// Stage exactly `len` bytes into the scratch area, accumulating as they
    /// arrive so a corrupt length field cannot force a huge allocation.
    fn fill_scratch(&mut self, len: usize, field: &str) -> Result<()> {
        self.scratch.clear();
        while self.scratch.len() < len {
            let chunk = self.buf.read_region(len - self.scratch.len())?;
            if chunk.is_empty() {
                return Err(Error::CacheTruncated(field.into()));
            }
            self.scratch.extend_from_slice(chunk);
        }
        Ok(())
    }
}

/// Decode one namespace's feature stream.
///
/// The entry count is implied by the block length. A negative index delta
/// clears the example's sorted flag.
fn decode_feature_block(
    block: &[u8],
    features: &mut Vec<Feature>,
    sorted: &mut bool,
) -> Result<()> {
    let mut cursor = block;
    let mut last: u64 = 0;

    while !cursor.is_empty() {
        let header = decode_varint_u64(&mut cursor)?;

        let value = if header & VALUE_NEG_ONE != 0 {
            -1.0
        } else if header & VALUE_GENERAL != 0 {
            if cursor.len() < 4 {
                return Err(Error::CacheTruncated("feature value".into()));
            }
            let (raw, rest) = cursor.split_at(4);
            cursor = rest;
            f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
        } else {
            1.0
        };

        let delta = zigzag_decode(header >> 2);
        if delta < 0 {
            *sorted = false;
        }
        let index = last.wrapping_add(delta as u64);
        last = index;

        features.push(Feature::new(index, value));
    }

    Ok(())
}
