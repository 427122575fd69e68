//! Fixed PCM stream format
//!
//! Streamed files are raw sample data with no header. The format exists to
//! convert durations and percentages into byte counts.

/// PCM format descriptor for the streamed audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Number of interleaved channels
    pub channels: u16,
    /// Bits per sample per channel
    pub bits_per_sample: u16,
    /// Samples per second
    pub sample_rate: u32,
}

impl AudioFormat {
    /// The fixed streaming format: mono, 16-bit signed, 44.1 kHz
    pub const fn pcm_mono_44100() -> Self {
        AudioFormat {
            channels: 1,
            bits_per_sample: 16,
            sample_rate: 44_100,
        }
    }

    /// Bytes occupied by one sample frame
    pub const fn block_align(&self) -> usize {
        (self.channels as usize * self.bits_per_sample as usize) / 8
    }

    /// Bytes consumed by one second of playback
    pub const fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm_mono_44100()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_16bit_geometry() {
        let format = AudioFormat::pcm_mono_44100();
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.bytes_per_second(), 88_200);
    }

    #[test]
    fn test_default_is_stream_format() {
        assert_eq!(AudioFormat::default(), AudioFormat::pcm_mono_44100());
    }
}
