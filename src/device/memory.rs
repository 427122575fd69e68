//! In-memory device buffer
//!
//! A deterministic [`DeviceBuffer`] backed by plain RAM. The play cursor
//! only moves when the host advances it explicitly, latching the
//! notification flag of every registered offset it passes. This is the
//! device used by the test suite, and it suits hosts that pace playback
//! themselves.

use super::{DeviceBuffer, OutputDevice, NUM_NOTIFY_POSITIONS};
use crate::format::AudioFormat;
use crate::{Result, StreamError};

/// Allocates [`MemoryBuffer`]s; the in-memory analogue of an output device
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryDevice;

impl OutputDevice for MemoryDevice {
    type Buffer = MemoryBuffer;

    fn create_buffer(&mut self, _format: AudioFormat, size_bytes: usize) -> Result<MemoryBuffer> {
        if size_bytes == 0 {
            return Err(StreamError::Device(
                "cannot allocate a zero-byte device buffer".into(),
            ));
        }
        Ok(MemoryBuffer::new(size_bytes))
    }
}

/// RAM-backed circular device buffer with a simulated play cursor
pub struct MemoryBuffer {
    data: Vec<u8>,
    notify_offsets: Option<[usize; NUM_NOTIFY_POSITIONS]>,
    signaled: [bool; NUM_NOTIFY_POSITIONS],
    cursor: usize,
    playing: bool,
    locked: bool,
    stop_calls: usize,
}

impl MemoryBuffer {
    /// Create a buffer of `capacity` bytes, zero-filled
    pub fn new(capacity: usize) -> Self {
        MemoryBuffer {
            data: vec![0; capacity],
            notify_offsets: None,
            signaled: [false; NUM_NOTIFY_POSITIONS],
            cursor: 0,
            playing: false,
            locked: false,
            stop_calls: 0,
        }
    }

    /// Current simulated play cursor offset
    pub fn play_cursor(&self) -> usize {
        self.cursor
    }

    /// True while looping playback is active
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of times [`DeviceBuffer::stop`] has been called
    pub fn stop_count(&self) -> usize {
        self.stop_calls
    }

    /// The raw buffer contents, for readback
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Advance the simulated play cursor by `bytes`, wrapping at capacity
    ///
    /// Latches the signal flag of every registered notification offset the
    /// cursor passes. Does nothing while playback is stopped, matching a
    /// real device whose cursor only moves during playback.
    pub fn advance_play_cursor(&mut self, bytes: usize) {
        if !self.playing || bytes == 0 {
            return;
        }

        let cap = self.data.len();
        let start = self.cursor;
        self.cursor = (self.cursor + bytes) % cap;

        if let Some(offsets) = self.notify_offsets {
            for (flag, &offset) in self.signaled.iter_mut().zip(offsets.iter()) {
                let distance = (offset + cap - start) % cap;
                if (distance != 0 && distance <= bytes) || bytes >= cap {
                    *flag = true;
                }
            }
        }
    }
}

impl DeviceBuffer for MemoryBuffer {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn register_notifications(&mut self, offsets: [usize; NUM_NOTIFY_POSITIONS]) -> Result<()> {
        for &offset in &offsets {
            if offset >= self.data.len() {
                return Err(StreamError::Device(format!(
                    "notification offset {} outside buffer of {} bytes",
                    offset,
                    self.data.len()
                )));
            }
        }
        self.notify_offsets = Some(offsets);
        self.signaled = [false; NUM_NOTIFY_POSITIONS];
        Ok(())
    }

    fn poll_signaled(&mut self, index: usize) -> bool {
        match self.signaled.get_mut(index) {
            Some(flag) => std::mem::take(flag),
            None => false,
        }
    }

    fn lock(&mut self, offset: usize, size: usize) -> Result<(&mut [u8], Option<&mut [u8]>)> {
        let cap = self.data.len();
        if offset >= cap || size > cap {
            return Err(StreamError::Device(format!(
                "lock of {} bytes at {} exceeds buffer of {} bytes",
                size, offset, cap
            )));
        }
        if self.locked {
            return Err(StreamError::Device("buffer is already locked".into()));
        }
        self.locked = true;

        let first_len = size.min(cap - offset);
        if first_len == size {
            Ok((&mut self.data[offset..offset + size], None))
        } else {
            let (head, tail) = self.data.split_at_mut(offset);
            Ok((tail, Some(&mut head[..size - first_len])))
        }
    }

    fn unlock(&mut self) -> Result<()> {
        if !self.locked {
            return Err(StreamError::Device("unlock without a lock".into()));
        }
        self.locked = false;
        Ok(())
    }

    fn set_position(&mut self, offset: usize) -> Result<()> {
        if offset >= self.data.len() {
            return Err(StreamError::Device(format!(
                "position {} outside buffer of {} bytes",
                offset,
                self.data.len()
            )));
        }
        self.cursor = offset;
        Ok(())
    }

    fn play_looping(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.playing = false;
        self.stop_calls += 1;
        Ok(())
    }
}
