//! Audio device abstraction
//!
//! The circular buffer drives playback through these traits rather than a
//! concrete audio API, so hardware backends and the in-memory test device
//! are interchangeable. An implementation owns a block of circular device
//! memory, signals play-cursor crossings of registered offsets, and hands
//! out locked writable spans.

use crate::format::AudioFormat;
use crate::Result;

pub mod memory;

pub use memory::{MemoryBuffer, MemoryDevice};

/// Number of notification positions a buffer watches
pub const NUM_NOTIFY_POSITIONS: usize = 2;

/// An audio output device that can allocate circular buffers
pub trait OutputDevice {
    /// The buffer type this device allocates
    type Buffer: DeviceBuffer;

    /// Allocate a circular device buffer of `size_bytes` for `format`
    ///
    /// Allocation failures are fatal to the object being constructed on
    /// top of the buffer; see [`crate::CircularNotifyBuffer::new`].
    fn create_buffer(&mut self, format: AudioFormat, size_bytes: usize) -> Result<Self::Buffer>;
}

/// A fixed-capacity circular audio buffer owned by an output device
///
/// All runtime operations are fallible and recoverable: a failed lock,
/// write or transport call is reported to the caller rather than treated
/// as fatal.
pub trait DeviceBuffer {
    /// Total capacity of the buffer in bytes
    fn capacity(&self) -> usize;

    /// Register the byte offsets at which play-cursor crossings are
    /// signaled, one per notification position
    fn register_notifications(&mut self, offsets: [usize; NUM_NOTIFY_POSITIONS]) -> Result<()>;

    /// Poll one notification position without blocking
    ///
    /// Returns true if the play cursor crossed the registered offset since
    /// the last poll that returned true. Signals auto-reset: once a
    /// crossing has been observed it is not reported again until the
    /// cursor crosses that offset once more.
    fn poll_signaled(&mut self, index: usize) -> bool;

    /// Lock `[offset, offset + size)` for writing
    ///
    /// Returns one writable span, plus a second span when the range wraps
    /// past the physical end of the buffer. The span lengths always sum to
    /// `size`. The caller must release the lock with [`unlock`] once the
    /// copy is done.
    ///
    /// [`unlock`]: DeviceBuffer::unlock
    fn lock(&mut self, offset: usize, size: usize) -> Result<(&mut [u8], Option<&mut [u8]>)>;

    /// Release the most recent lock
    fn unlock(&mut self) -> Result<()>;

    /// Move the play cursor to a byte offset
    fn set_position(&mut self, offset: usize) -> Result<()>;

    /// Start looping playback from the current play cursor
    fn play_looping(&mut self) -> Result<()>;

    /// Halt playback
    ///
    /// The cursor is left wherever the device puts it; the next
    /// [`set_position`] + [`play_looping`] pair restarts cleanly.
    ///
    /// [`set_position`]: DeviceBuffer::set_position
    /// [`play_looping`]: DeviceBuffer::play_looping
    fn stop(&mut self) -> Result<()>;
}
