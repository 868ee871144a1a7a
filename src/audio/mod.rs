//! Audio plumbing around the session engine.
//!
//! The engine only ever sees raw PCM16 mono byte streams. This module holds
//! the capture-side queue, a WAV file capture source and the playback clock
//! that drains the [`PlaybackBuffer`](crate::core::playback::PlaybackBuffer)
//! into an [`AudioSink`](output::AudioSink).

pub mod input;
pub mod output;

pub use input::{CAPTURE_QUEUE_CAPACITY, CaptureQueue, WavCaptureSource};
pub use output::{AudioSink, DiscardSink, PlaybackClock, WavSink};

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the file-backed audio endpoints.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("WAV I/O failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

/// Bytes per PCM16 sample.
pub const PCM16_BYTES_PER_SAMPLE: u32 = 2;

/// Length of one capture or playback block.
pub const BLOCK_DURATION: Duration = Duration::from_millis(100);

/// Number of PCM16 mono bytes covering `duration` at `sample_rate`.
pub fn bytes_for_duration(duration: Duration, sample_rate: u32) -> usize {
    let bytes_per_second = u128::from(sample_rate) * u128::from(PCM16_BYTES_PER_SAMPLE);
    (bytes_per_second * duration.as_micros() / 1_000_000) as usize
}

/// Playback duration of `bytes` PCM16 mono bytes at `sample_rate`.
pub fn duration_for_bytes(bytes: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let bytes_per_second = u64::from(sample_rate) * u64::from(PCM16_BYTES_PER_SAMPLE);
    Duration::from_micros(bytes * 1_000_000 / bytes_per_second)
}

/// MIME type for PCM16 audio at `sample_rate`, as the Live API expects it.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}
