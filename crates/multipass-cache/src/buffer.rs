//! Stream Buffer - Multiplexed Reads/Writes Over Ordered Endpoints
//!
//! This module implements `StreamBuffer`, the byte engine under the example
//! codec. One buffer owns one contiguous, grow-only arena and drives either a
//! chain of input endpoints (read mode) or a single output endpoint (write
//! mode) - never both.
//!
//! ## Arena Layout
//!
//! ```text
//! read mode:
//! ┌────────────┬──────────────────────┬─────────────────┐
//! │ consumed   │ unconsumed           │ free            │
//! └────────────┴──────────────────────┴─────────────────┘
//! 0            head                   valid_end         capacity
//!
//! write mode:
//! ┌───────────────────────────┬──────────────────────────┐
//! │ unflushed                 │ free                     │
//! └───────────────────────────┴──────────────────────────┘
//! 0                           head                       capacity
//! ```
//!
//! Invariant in read mode: `0 <= head <= valid_end <= capacity`.
//!
//! ## Refill and Growth Discipline
//!
//! When a read wants more than is buffered, the unconsumed span is first
//! shifted down to the arena start (reclaiming consumed space without
//! reallocating), then the current input endpoint is drained; an exhausted
//! endpoint transparently advances to the next one in the chain. Capacity
//! only ever doubles, and only on two paths: `read_until` when the arena is
//! completely full before the delimiter appears, and `write_region` when the
//! arena is too small to ever hold the request. Shifting happens only in
//! read mode, growth in write mode only via `write_region`, so reallocation
//! count stays O(log(total bytes)) no matter how many small calls occur.
//!
//! A single `read_region` call returns at most one arena's worth of bytes;
//! `fixed_read` chunks larger requests through it.
//!
//! ## Checksumming
//!
//! With `verify_checksum(true)`, a CRC32 accumulates over every byte in
//! wire order: on the read side as bytes are consumed, on the write side as
//! bytes are flushed to the endpoint. Accumulation order therefore matches
//! byte order exactly, so a read split into many small calls produces the
//! same value as one large call. Disabling clears the accumulator so the
//! same buffer can be reused across independent verification passes. This
//! component only produces the value; comparing it against an expected
//! checksum is the caller's job.
//!
//! ## Thread Safety
//!
//! StreamBuffer is NOT thread-safe and is never shared between threads; each
//! training worker owns its own cache file and buffer. Every call either
//! completes or returns an error - there is no suspension point, and a
//! blocked endpoint read blocks the calling thread.

use tracing::{debug, warn};

use crate::endpoint::{ByteSink, ByteSource};
use crate::error::{Error, Result};

/// Default initial arena capacity (64 KiB).
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// A streaming byte buffer over ordered input or output endpoints.
pub struct StreamBuffer {
    /// The arena. Its length is the current capacity.
    arena: Vec<u8>,

    /// Read mode: next unconsumed byte. Write mode: next free byte.
    head: usize,

    /// Read mode: end of buffered data. Unused in write mode.
    valid_end: usize,

    /// Ordered input endpoints (read mode)
    inputs: Vec<Box<dyn ByteSource>>,

    /// Index of the input endpoint currently being drained
    current: usize,

    /// The output endpoint (write mode)
    output: Option<Box<dyn ByteSink>>,

    /// Whether the running checksum accumulates
    checksum_enabled: bool,

    /// Running CRC32 over consumed (read) or flushed (write) bytes
    hasher: crc32fast::Hasher,
}

impl StreamBuffer {
    /// Create an empty buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty buffer with a given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: vec![0; capacity.max(1)],
            head: 0,
            valid_end: 0,
            inputs: Vec::new(),
            current: 0,
            output: None,
            checksum_enabled: false,
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// Create a read-mode buffer over an ordered endpoint chain.
    pub fn for_reading(sources: Vec<Box<dyn ByteSource>>) -> Self {
        let mut buf = Self::new();
        buf.inputs = sources;
        buf
    }

    /// Create a write-mode buffer over one output endpoint.
    pub fn for_writing(sink: Box<dyn ByteSink>) -> Self {
        let mut buf = Self::new();
        buf.output = Some(sink);
        buf
    }

    /// Append another input endpoint to the chain.
    pub fn add_source(&mut self, source: Box<dyn ByteSource>) -> Result<()> {
        if self.output.is_some() {
            return Err(Error::InvalidMode(
                "cannot attach an input endpoint to a write buffer".into(),
            ));
        }
        self.inputs.push(source);
        Ok(())
    }

    /// Attach the output endpoint.
    pub fn set_sink(&mut self, sink: Box<dyn ByteSink>) -> Result<()> {
        if !self.inputs.is_empty() {
            return Err(Error::InvalidMode(
                "cannot attach an output endpoint to a read buffer".into(),
            ));
        }
        if self.output.is_some() {
            return Err(Error::InvalidMode(
                "a buffer drives exactly one output endpoint".into(),
            ));
        }
        self.output = Some(sink);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Return up to `n` unconsumed bytes, refilling from the endpoint chain
    /// as needed.
    ///
    /// The returned slice is shorter than `n` only when every endpoint is
    /// exhausted or the request exceeds one arena's worth of bytes; callers
    /// must check the returned length. A read spanning the boundary between
    /// two endpoints returns the concatenation.
    pub fn read_region(&mut self, n: usize) -> Result<&[u8]> {
        self.require_read_mode("read_region")?;

        while self.valid_end - self.head < n {
            self.reclaim();
            if self.valid_end == self.arena.len() {
                // Arena full; hand back one arena's worth and let the caller
                // come back for the rest.
                break;
            }
            if self.refill()? == 0 {
                break;
            }
        }

        let avail = (self.valid_end - self.head).min(n);
        let start = self.head;
        self.head += avail;
        let out = &self.arena[start..start + avail];
        if self.checksum_enabled {
            self.hasher.update(out);
        }
        Ok(out)
    }

    /// Return buffered bytes up to and including the first `delimiter`.
    ///
    /// This is the one read-mode path that grows the arena: if it fills up
    /// completely before the delimiter appears, capacity doubles and the
    /// scan continues. At end of input the remaining tail (possibly empty)
    /// is returned without a delimiter.
    pub fn read_until(&mut self, delimiter: u8) -> Result<&[u8]> {
        self.require_read_mode("read_until")?;

        let mut searched = 0usize;
        let len = loop {
            let span = &self.arena[self.head..self.valid_end];
            if let Some(pos) = span[searched..].iter().position(|&b| b == delimiter) {
                break searched + pos + 1;
            }
            searched = span.len();

            self.reclaim();
            if self.valid_end == self.arena.len() {
                self.grow_to(self.arena.len() * 2);
            }
            if self.refill()? == 0 {
                // Endpoints exhausted: the tail is the final (delimiterless)
                // region.
                break self.valid_end - self.head;
            }
        };

        let start = self.head;
        self.head += len;
        let out = &self.arena[start..start + len];
        if self.checksum_enabled {
            self.hasher.update(out);
        }
        Ok(out)
    }

    /// Read exactly `dst.len()` bytes, or as many as the endpoints still
    /// hold. Returns the number actually read; the caller decides whether a
    /// short count is end-of-stream or corruption.
    ///
    /// With `mismatch_message` set, the incoming bytes are compared against
    /// `dst` instead of copied into it; any difference is a
    /// [`SignatureMismatch`](Error::SignatureMismatch) carrying the message.
    pub fn fixed_read(&mut self, dst: &mut [u8], mismatch_message: Option<&str>) -> Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            let chunk = self.read_region(dst.len() - filled)?;
            if chunk.is_empty() {
                break;
            }
            let end = filled + chunk.len();
            match mismatch_message {
                None => dst[filled..end].copy_from_slice(chunk),
                Some(message) => {
                    if dst[filled..end] != *chunk {
                        return Err(Error::SignatureMismatch(message.to_string()));
                    }
                }
            }
            filled = end;
        }
        Ok(filled)
    }

    /// Rewind every input endpoint to its start for another pass.
    pub fn reset(&mut self) -> Result<()> {
        self.require_read_mode("reset")?;
        if !self.supports_reset() {
            return Err(Error::ResetUnsupported);
        }
        for source in &mut self.inputs {
            source.reset()?;
        }
        self.current = 0;
        self.head = 0;
        self.valid_end = 0;
        Ok(())
    }

    /// Whether every input endpoint can rewind to its start.
    pub fn supports_reset(&self) -> bool {
        self.inputs.iter().all(|s| s.supports_reset())
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Reserve `n` writable bytes and return them.
    ///
    /// If free space is short, unflushed bytes are flushed first; capacity
    /// doubles only when the arena is too small to ever hold `n` bytes.
    pub fn write_region(&mut self, n: usize) -> Result<&mut [u8]> {
        self.require_write_mode("write_region")?;

        while self.arena.len() - self.head < n {
            if self.head > 0 {
                self.flush()?;
            } else {
                self.grow_to(n);
            }
        }

        let start = self.head;
        self.head += n;
        Ok(&mut self.arena[start..start + n])
    }

    /// Write all of `src`, flushing and growing as needed.
    pub fn fixed_write(&mut self, src: &[u8]) -> Result<()> {
        let region = self.write_region(src.len())?;
        region.copy_from_slice(src);
        Ok(())
    }

    /// Flush `[0, head)` to the output endpoint and reset the cursor.
    pub fn flush(&mut self) -> Result<()> {
        self.require_write_mode("flush")?;
        if self.head == 0 {
            return Ok(());
        }
        let sink = self.output.as_mut().ok_or_else(|| {
            Error::InvalidMode("flush on a buffer with no output endpoint".into())
        })?;

        if self.checksum_enabled {
            self.hasher.update(&self.arena[..self.head]);
        }

        let mut written = 0;
        while written < self.head {
            let n = sink.write(&self.arena[written..self.head])?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "output endpoint accepted no bytes",
                )));
            }
            written += n;
        }
        debug!(bytes = self.head, "flushed buffer to output endpoint");
        self.head = 0;
        Ok(())
    }

    /// Flush remaining bytes, finalize the sink, and release all endpoints
    /// in LIFO order.
    pub fn close(&mut self) -> Result<()> {
        if self.output.is_some() {
            self.flush()?;
        }
        if let Some(mut sink) = self.output.take() {
            sink.finish()?;
        }
        while self.inputs.pop().is_some() {}
        self.current = 0;
        self.head = 0;
        self.valid_end = 0;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Checksum
    // ------------------------------------------------------------------

    /// Toggle checksum accumulation.
    ///
    /// Enabling starts accumulation from the current stream position, not
    /// retroactively. Disabling clears the accumulator so the instance can
    /// be reused cleanly.
    pub fn verify_checksum(&mut self, enabled: bool) {
        if !enabled {
            self.hasher = crc32fast::Hasher::new();
        }
        self.checksum_enabled = enabled;
    }

    /// The checksum accumulated so far.
    pub fn checksum_value(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current arena capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Unconsumed bytes currently buffered (read mode).
    pub fn buffered(&self) -> usize {
        self.valid_end - self.head
    }

    /// Bytes written but not yet flushed (write mode).
    pub fn pending(&self) -> usize {
        if self.output.is_some() {
            self.head
        } else {
            0
        }
    }

    /// Index of the input endpoint currently being drained.
    pub fn current_endpoint(&self) -> usize {
        self.current
    }

    /// Number of attached input endpoints.
    pub fn num_sources(&self) -> usize {
        self.inputs.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Shift the unconsumed span down to the arena start.
    fn reclaim(&mut self) {
        if self.head > 0 {
            self.arena.copy_within(self.head..self.valid_end, 0);
            self.valid_end -= self.head;
            self.head = 0;
        }
    }

    /// One refill attempt into the free region, advancing past exhausted
    /// endpoints. Returns the number of bytes added; 0 means every endpoint
    /// is exhausted (or the arena is full).
    fn refill(&mut self) -> Result<usize> {
        if self.valid_end == self.arena.len() {
            return Ok(0);
        }
        while self.current < self.inputs.len() {
            let n = self.inputs[self.current].read(&mut self.arena[self.valid_end..])?;
            if n > 0 {
                self.valid_end += n;
                return Ok(n);
            }
            debug!(endpoint = self.current, "input endpoint exhausted, advancing");
            self.current += 1;
        }
        Ok(0)
    }

    /// Double capacity until it is at least `min_capacity`.
    fn grow_to(&mut self, min_capacity: usize) {
        let mut cap = self.arena.len();
        while cap < min_capacity {
            cap *= 2;
        }
        if cap != self.arena.len() {
            debug!(from = self.arena.len(), to = cap, "doubling arena capacity");
            self.arena.resize(cap, 0);
        }
    }

    fn require_read_mode(&self, op: &str) -> Result<()> {
        if self.output.is_some() {
            return Err(Error::InvalidMode(format!("{op} on a write buffer")));
        }
        Ok(())
    }

    fn require_write_mode(&self, op: &str) -> Result<()> {
        if !self.inputs.is_empty() {
            return Err(Error::InvalidMode(format!("{op} on a read buffer")));
        }
        Ok(())
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamBuffer {
    fn drop(&mut self) {
        if self.output.is_some() {
            if let Err(e) = self.flush() {
                warn!(error = %e, "failed to flush buffer on drop");
            }
        }
        if let Some(mut sink) = self.output.take() {
            if let Err(e) = sink.finish() {
                warn!(error = %e, "failed to finalize output endpoint on drop");
            }
        }
        // Endpoints are released in LIFO order.
        while self.inputs.pop().is_some() {}
    }
}
