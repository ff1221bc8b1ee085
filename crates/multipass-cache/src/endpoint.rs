//! Byte Endpoints
//!
//! This module defines the endpoint seam under [`StreamBuffer`]: an ordered
//! byte source or sink with a read-or-write capability, never both.
//!
//! ## Endpoint Kinds
//!
//! | Endpoint | Direction | Reset | Backed by |
//! |----------|-----------|-------|-----------|
//! | `FileSource` / `FileSink` | read / write | yes / - | `std::fs::File` |
//! | `MemorySource` / `MemorySink` | read / write | yes / - | `Vec<u8>` |
//! | `GzipFileSource` / `GzipFileSink` | read / write | yes / - | `flate2` over a file |
//!
//! Compression is just another endpoint: the buffer and codec never know
//! whether bytes cross a gzip boundary.
//!
//! ## Reset Capability
//!
//! Re-reading a cache from the beginning (a second training pass) requires
//! every input endpoint to support reset-to-start. Not all do - a socket
//! cannot rewind - so callers query `supports_reset()` before relying on it.
//!
//! [`StreamBuffer`]: crate::buffer::StreamBuffer

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// An ordered byte source the buffer can drain.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. Returns 0 only when exhausted.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether [`reset`](Self::reset) can rewind this source to its start.
    fn supports_reset(&self) -> bool {
        false
    }

    /// Rewind to the first byte.
    fn reset(&mut self) -> Result<()> {
        Err(Error::ResetUnsupported)
    }
}

/// An ordered byte sink the buffer flushes into.
pub trait ByteSink {
    /// Write up to `buf.len()` bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Finalize the sink (write trailers, sync). Called once on close.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Plain file endpoints
// ============================================================================

/// Read endpoint over a plain file.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn supports_reset(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

/// Write endpoint over a plain file.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::create(path)?,
        })
    }
}

impl ByteSink for FileSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    fn finish(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

// ============================================================================
// In-memory endpoints
// ============================================================================

/// Read endpoint over an owned byte vector.
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn supports_reset(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}

/// Write endpoint appending to a shared byte vector.
///
/// The backing vector is shared through `Rc<RefCell<_>>` so the bytes stay
/// inspectable after a buffer has taken ownership of the endpoint. Buffers
/// are single-owner, single-threaded, so a plain `Rc` is the right tool.
#[derive(Clone, Default)]
pub struct MemorySink {
    data: Rc<RefCell<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

impl ByteSink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.data.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
}

// ============================================================================
// Gzip file endpoints
// ============================================================================

/// Read endpoint over a gzip-compressed file.
///
/// Reset reopens the file and restarts the decoder; the decompressor itself
/// cannot rewind.
pub struct GzipFileSource {
    path: PathBuf,
    decoder: GzDecoder<File>,
}

impl GzipFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let decoder = GzDecoder::new(File::open(&path)?);
        Ok(Self { path, decoder })
    }
}

impl ByteSource for GzipFileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.decoder.read(buf)?)
    }

    fn supports_reset(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<()> {
        self.decoder = GzDecoder::new(File::open(&self.path)?);
        Ok(())
    }
}

/// Write endpoint over a gzip-compressed file.
pub struct GzipFileSink {
    encoder: Option<GzEncoder<File>>,
}

impl GzipFileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let encoder = GzEncoder::new(File::create(path)?, Compression::default());
        Ok(Self {
            encoder: Some(encoder),
        })
    }
}

impl ByteSink for GzipFileSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.encoder.as_mut() {
            Some(enc) => Ok(enc.write(buf)?),
            None => Err(Error::InvalidMode("write after gzip sink finished".into())),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(enc) = self.encoder.take() {
            let file = enc.finish()?;
            file.sync_all()?;
        }
        Ok(())
    }
}
