//! Chunked audio file reading with zero padding
//!
//! Reads fixed-size chunks of raw PCM data from a byte source into an
//! internal buffer. When the source runs out, the tail of the chunk is
//! padded with zeros so a full chunk is always available to hand to the
//! device. Reaching end of file is an expected terminal condition, not a
//! failure.

use std::io::{ErrorKind, Read};

/// Outcome of a single chunk read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The chunk was filled entirely with source bytes
    Ok,
    /// The source is exhausted; any missing bytes were zero-filled
    EndOfFile,
    /// A non-EOF I/O error occurred; the reader will not recover
    Failed,
}

/// Reads chunks of audio data from a byte source into an internal buffer
///
/// The reader owns its source and consumes it strictly sequentially.
/// Once end of file or a read error has been observed, every further
/// `read` zero-fills the requested span and repeats the same status.
pub struct ChunkReader<R> {
    buf: Vec<u8>,
    data_len: usize,
    source: R,
    /// One byte of lookahead, consumed while probing for end of file.
    pending: Option<u8>,
    at_eof: bool,
    failed: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Create a reader with an internal buffer of `capacity` bytes
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, source: R) -> Self {
        assert!(capacity >= 1, "chunk capacity must be at least 1 byte");
        ChunkReader {
            buf: vec![0; capacity],
            data_len: 0,
            source,
            pending: None,
            at_eof: false,
            failed: false,
        }
    }

    /// Internal buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// True once the source has been fully consumed
    pub fn at_eof(&self) -> bool {
        self.at_eof
    }

    /// True if a read error occurred; sticky, and distinct from EOF
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The last filled extent, including any zero padding
    ///
    /// Empty before the first read; afterwards always exactly as long as
    /// the last requested size.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.data_len]
    }

    /// Fill the whole internal buffer with the next chunk
    pub fn read_full(&mut self) -> ReadStatus {
        self.read(self.buf.len())
    }

    /// Load the next `size` bytes of audio into the internal buffer
    ///
    /// If the source ends mid-chunk the remainder is zero-padded and
    /// [`ReadStatus::EndOfFile`] is reported; if it ends exactly on the
    /// chunk boundary, all `size` bytes are valid and EOF is still
    /// reported. After a terminal status the read is a zero-filling no-op
    /// that repeats that status.
    ///
    /// # Panics
    /// Panics if `size` exceeds the buffer capacity.
    pub fn read(&mut self, size: usize) -> ReadStatus {
        assert!(
            size <= self.buf.len(),
            "requested {} bytes from a reader with capacity {}",
            size,
            self.buf.len()
        );

        if self.failed {
            self.zero_data(size);
            return ReadStatus::Failed;
        }
        if self.at_eof {
            self.zero_data(size);
            return ReadStatus::EndOfFile;
        }

        let mut filled = 0;
        if let Some(byte) = self.pending.take() {
            if size > 0 {
                self.buf[0] = byte;
                filled = 1;
            } else {
                self.pending = Some(byte);
            }
        }

        while filled < size {
            match self.source.read(&mut self.buf[filled..size]) {
                Ok(0) => {
                    self.at_eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.failed = true;
                    self.zero_data(size);
                    return ReadStatus::Failed;
                }
            }
        }

        if size > 0 && filled == size && !self.at_eof && self.pending.is_none() {
            // Probe one byte ahead so a source that ends exactly on the
            // chunk boundary reports EOF now, with all bytes still valid.
            if let Err(status) = self.probe_eof() {
                self.zero_data(size);
                return status;
            }
        }

        // Pad whatever the source could not provide.
        self.buf[filled..size].fill(0);
        self.data_len = size;

        if self.at_eof {
            ReadStatus::EndOfFile
        } else {
            ReadStatus::Ok
        }
    }

    fn probe_eof(&mut self) -> std::result::Result<(), ReadStatus> {
        let mut probe = [0u8; 1];
        loop {
            match self.source.read(&mut probe) {
                Ok(0) => {
                    self.at_eof = true;
                    return Ok(());
                }
                Ok(_) => {
                    self.pending = Some(probe[0]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.failed = true;
                    return Err(ReadStatus::Failed);
                }
            }
        }
    }

    fn zero_data(&mut self, size: usize) {
        self.buf[..size].fill(0);
        self.data_len = size;
    }

    /// Force the reader into its failed state, as if a read had errored.
    #[cfg(test)]
    pub(crate) fn poison(&mut self) {
        self.failed = true;
    }
}
