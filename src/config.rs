//! Stream configuration

use crate::format::AudioFormat;
use crate::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the streaming engine
///
/// The defaults (2 seconds of buffer, notifications at 25% and 75%, a
/// 300 ms tick) give each region a full second of playback per refill
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Ring buffer length in seconds of audio
    pub seconds: u32,
    /// Notification positions as percentages of the buffer, lower first
    pub notify_positions: [u8; 2],
    /// Tick period in milliseconds
    pub tick_period_ms: u64,
}

impl StreamConfig {
    /// Tick period as a [`Duration`]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Playback duration of the smaller of the two regions, in milliseconds
    pub fn min_region_ms(&self) -> u64 {
        let [p0, p1] = self.notify_positions;
        let span = p1.saturating_sub(p0).min(100) as u64;
        let min_pct = span.min(100 - span);
        u64::from(self.seconds) * 1000 * min_pct / 100
    }

    /// Check the configuration invariants
    ///
    /// Requires `seconds >= 1`, `p0 < p1 <= 100`, and a tick period
    /// strictly shorter than the playback duration of either region. The
    /// last condition is a correctness precondition of the whole design:
    /// a slower tick lets the device underrun before a refill lands.
    pub fn validate(&self) -> Result<()> {
        if self.seconds < 1 {
            return Err(StreamError::Config(
                "buffer length must be at least one second".into(),
            ));
        }

        let [p0, p1] = self.notify_positions;
        if p0 >= p1 || p1 > 100 {
            return Err(StreamError::Config(format!(
                "notification positions must satisfy p0 < p1 <= 100, got [{}, {}]",
                p0, p1
            )));
        }

        if self.tick_period_ms == 0 || self.tick_period_ms >= self.min_region_ms() {
            return Err(StreamError::Config(format!(
                "tick period of {} ms must be shorter than the smallest region ({} ms)",
                self.tick_period_ms,
                self.min_region_ms()
            )));
        }

        Ok(())
    }

    /// Ring buffer capacity in bytes for `format`
    pub fn capacity_bytes(&self, format: &AudioFormat) -> usize {
        self.seconds as usize * format.bytes_per_second()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            seconds: 2,
            notify_positions: [25, 75],
            tick_period_ms: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity_bytes(&AudioFormat::default()), 176_400);
        assert_eq!(config.min_region_ms(), 1000);
    }

    #[test]
    fn test_rejects_unordered_positions() {
        let config = StreamConfig {
            notify_positions: [75, 25],
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StreamConfig {
            notify_positions: [25, 25],
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_position_past_100() {
        let config = StreamConfig {
            notify_positions: [25, 101],
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_seconds() {
        let config = StreamConfig {
            seconds: 0,
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_tick_slower_than_region() {
        // 1 second buffer, 25/75 -> each region plays for 500 ms.
        let config = StreamConfig {
            seconds: 1,
            notify_positions: [25, 75],
            tick_period_ms: 500,
        };
        assert!(config.validate().is_err());

        let config = StreamConfig {
            tick_period_ms: 499,
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
