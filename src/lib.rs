//! Double-buffered PCM audio streaming
//!
//! Streams raw PCM sample data from a file into a fixed-capacity circular
//! device buffer so that playback never glitches while only a small,
//! bounded window of audio is held in memory at a time.
//!
//! The buffer is carved into two regions by two notification positions.
//! Whenever the device's play cursor crosses one of the positions, the
//! engine refills the *opposite* region, the one that just finished playing
//! and is safe to overwrite, with the next chunk of the file. When the
//! file runs out, the final chunk is zero-padded and playback stops
//! gracefully once the padded tail has been played.
//!
//! Streams are raw sample data with no header: mono, 16-bit signed PCM at
//! 44.1 kHz. Container parsing, mixing and volume control are out of scope.
//!
//! # Architecture
//! - [`ChunkReader`]: sequential fixed-size chunk reads with zero padding
//! - [`CircularNotifyBuffer`]: region geometry and wrap-aware writes on
//!   top of an abstract [`DeviceBuffer`]
//! - [`CommandQueue`]: MPSC FIFO carrying play/pause/stop requests from
//!   arbitrary threads into the engine
//! - [`StreamingEngine`]: the periodic tick, one command or one refill
//! - [`TickDriver`]: hosts the tick loop on a dedicated thread
//!
//! # Quick start
//! ```no_run
//! use pcmstream::{MemoryDevice, StreamConfig, StreamingEngine, TickDriver};
//!
//! let config = StreamConfig::default();
//! let mut device = MemoryDevice::default();
//! let engine = StreamingEngine::new(&mut device, &config).unwrap();
//!
//! let driver = TickDriver::spawn(engine, config.tick_period());
//! driver.play("music.pcm");
//! // ... later ...
//! driver.stop();
//! ```
//!
//! The tick period must be strictly shorter than the real-time playback
//! duration of one buffer region, or the device underruns before a refill
//! lands; [`StreamConfig::validate`] enforces this.

#![warn(missing_docs)]

pub mod buffer;
pub mod config;
pub mod device;
pub mod engine;
pub mod format;
pub mod queue;
pub mod reader;
pub mod scheduler;

/// Error types for streaming operations
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// IO error from the filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    Device(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for StreamError {
    /// Converts a String into `StreamError::Other`.
    ///
    /// Convenience for generic string errors; prefer the specific variant
    /// constructors (`Device`, `Config`) where the error kind is known.
    fn from(msg: String) -> Self {
        StreamError::Other(msg)
    }
}

impl From<&str> for StreamError {
    /// Converts a string slice into `StreamError::Other`.
    fn from(msg: &str) -> Self {
        StreamError::Other(msg.to_string())
    }
}

/// Result type for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

// Public API exports
pub use buffer::CircularNotifyBuffer;
pub use config::StreamConfig;
pub use device::{DeviceBuffer, MemoryBuffer, MemoryDevice, OutputDevice};
pub use engine::StreamingEngine;
pub use format::AudioFormat;
pub use queue::{Command, CommandQueue};
pub use reader::{ChunkReader, ReadStatus};
pub use scheduler::TickDriver;
