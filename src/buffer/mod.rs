//! Circular notification buffer
//!
//! Carves a device buffer into two regions delimited by two notification
//! positions, each a percentage of the buffer capacity:
//!
//! ```text
//! 0%             25%                              75%              100%
//! |---------------|--------------------------------|----------------|
//! |    region 1   |            region 0            |    region 1    |
//! |---------------|--------------------------------|----------------|
//!               pos 0                            pos 1
//! ```
//!
//! Region 0 is contiguous; region 1 wraps past the physical end of the
//! buffer back to offset 0. The two regions are disjoint, jointly
//! exhaustive, and their sizes always sum exactly to the capacity. The
//! device signals whenever the play cursor crosses one of the positions,
//! which tells the engine the opposite region is safe to refill.

use crate::device::{DeviceBuffer, OutputDevice, NUM_NOTIFY_POSITIONS};
use crate::format::AudioFormat;
use crate::{Result, StreamError};
use log::trace;

/// A contiguous byte range within the buffer
#[derive(Debug, Clone, Copy, Default)]
struct Region {
    begin: usize,
    len: usize,
}

/// A circular device buffer with two watched notification positions
pub struct CircularNotifyBuffer<B> {
    device: B,
    format: AudioFormat,
    capacity: usize,
    regions: [Region; NUM_NOTIFY_POSITIONS],
}

impl<B: DeviceBuffer> CircularNotifyBuffer<B> {
    /// Allocate a device buffer for `seconds` of audio and register the
    /// two notification positions, given as percentages of the capacity
    ///
    /// The positions must satisfy `p0 < p1 <= 100`, excluding the pair
    /// `[0, 100]`, which would collapse both watched offsets to 0 and
    /// leave region 1 empty.
    ///
    /// Construction either fully succeeds or fails: an allocation or
    /// registration error aborts it and no buffer object comes into
    /// existence.
    pub fn new<D>(
        device: &mut D,
        format: AudioFormat,
        seconds: u32,
        notify_positions: [u8; NUM_NOTIFY_POSITIONS],
    ) -> Result<Self>
    where
        D: OutputDevice<Buffer = B>,
    {
        let [p0, p1] = notify_positions;
        if seconds < 1 {
            return Err(StreamError::Config(
                "buffer length must be at least one second".into(),
            ));
        }
        if p0 >= p1 || p1 > 100 {
            return Err(StreamError::Config(format!(
                "notification positions must satisfy p0 < p1 <= 100, got [{}, {}]",
                p0, p1
            )));
        }
        // [0, 100] would register both watched offsets at 0 and leave
        // region 1 with zero bytes.
        if p0 == 0 && p1 == 100 {
            return Err(StreamError::Config(
                "notification positions [0, 100] leave region 1 empty".into(),
            ));
        }

        let capacity = seconds as usize * format.bytes_per_second();

        // Offsets first, sizes by subtraction: keeps the regions disjoint
        // and summing exactly to the capacity in integer arithmetic.
        let start0 = capacity * p0 as usize / 100;
        let start1 = capacity * p1 as usize / 100;
        let size0 = start1 - start0;
        let regions = [
            Region {
                begin: start0,
                len: size0,
            },
            Region {
                // p1 == 100 degenerates to the wrap point.
                begin: start1 % capacity,
                len: capacity - size0,
            },
        ];

        let mut buffer = device.create_buffer(format, capacity)?;
        buffer.register_notifications([regions[0].begin, regions[1].begin])?;

        Ok(CircularNotifyBuffer {
            device: buffer,
            format,
            capacity,
            regions,
        })
    }

    /// Maximum number of bytes the buffer can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The stream format the buffer was sized for
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Number of bytes occupied by a region
    ///
    /// # Panics
    /// Panics unless `region` is 0 or 1.
    pub fn region_size(&self, region: usize) -> usize {
        self.regions[region].len
    }

    /// Byte offset of a region from the start of the buffer
    ///
    /// # Panics
    /// Panics unless `region` is 0 or 1.
    pub fn region_start(&self, region: usize) -> usize {
        self.regions[region].begin
    }

    /// Poll for a play-cursor crossing without blocking
    ///
    /// Returns the lowest-indexed signaled position, if any. Only the
    /// returned position is consumed; a simultaneous signal on the other
    /// position stays latched for the next poll.
    pub fn position_signaled(&mut self) -> Option<usize> {
        (0..NUM_NOTIFY_POSITIONS).find(|&index| self.device.poll_signaled(index))
    }

    /// Reset the play cursor to offset 0 and start looping playback
    pub fn play(&mut self) -> Result<()> {
        self.device.set_position(0)?;
        self.device.play_looping()
    }

    /// Halt playback
    pub fn stop(&mut self) -> Result<()> {
        self.device.stop()
    }

    /// Fill a whole region with bytes from `src`
    ///
    /// Exactly `region_size(region)` bytes are written starting at
    /// `region_start(region)`.
    ///
    /// # Panics
    /// Panics unless `region` is 0 or 1 and `src` holds at least
    /// `region_size(region)` bytes.
    pub fn write_to_region(&mut self, region: usize, src: &[u8]) -> Result<()> {
        let Region { begin, len } = self.regions[region];
        self.write(begin, &src[..len])
    }

    /// Write `src` into the buffer starting at `dest`, wrapping past the
    /// physical end if needed
    pub fn write(&mut self, dest: usize, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }

        {
            let (first, second) = self.device.lock(dest, src.len())?;
            let split = first.len();
            trace!("write {} bytes at {}", split, dest);
            first.copy_from_slice(&src[..split]);
            if let Some(second) = second {
                trace!("write {} bytes at 0 (wrapped)", second.len());
                second.copy_from_slice(&src[split..]);
            } else {
                debug_assert_eq!(split, src.len(), "lock spans must cover the request");
            }
        }

        self.device.unlock()
    }

    /// Mutable access to the underlying device buffer
    ///
    /// Intended for device implementations that are paced by the host,
    /// such as [`crate::MemoryBuffer`]'s simulated play cursor.
    pub fn device_mut(&mut self) -> &mut B {
        &mut self.device
    }

    /// Shared access to the underlying device buffer
    pub fn device(&self) -> &B {
        &self.device
    }
}
