//! Tunables of the session engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::PCM16_BYTES_PER_SAMPLE;
use crate::core::sync::DEFAULT_SYNC_INTERVAL;
use crate::core::transcript::DEFAULT_HISTORY_WINDOW;

/// Default slack between played audio and released text.
pub const DEFAULT_PLAYBACK_LEAD: Duration = Duration::from_millis(100);

/// Default output sample rate (Gemini Live native audio).
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Engine configuration surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Turns kept in the rolling history
    pub history_window: usize,
    /// How far ahead of playback text may be released
    pub playback_lead: Duration,
    /// Wake-up interval of the sync loop
    pub sync_interval: Duration,
    /// Sample rate of the model's audio output
    pub output_sample_rate: u32,
    pub bytes_per_sample: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            playback_lead: DEFAULT_PLAYBACK_LEAD,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            output_sample_rate: DEFAULT_OUTPUT_SAMPLE_RATE,
            bytes_per_sample: PCM16_BYTES_PER_SAMPLE,
        }
    }
}

impl EngineConfig {
    /// Lead tolerance expressed in output bytes.
    pub fn lead_bytes(&self) -> u64 {
        let bytes_per_second = u128::from(self.output_sample_rate) * u128::from(self.bytes_per_sample);
        (bytes_per_second * self.playback_lead.as_micros() / 1_000_000) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_window, 4);
        assert_eq!(config.sync_interval, Duration::from_millis(30));
        assert_eq!(config.lead_bytes(), 4800);
    }

    #[test]
    fn test_lead_bytes_scales_with_rate() {
        let config = EngineConfig {
            output_sample_rate: 16000,
            playback_lead: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(config.lead_bytes(), 8000);
    }
}
