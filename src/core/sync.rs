//! Releases responder text in step with audio playback.
//!
//! Each segment carries the `total_received` value of the playback buffer at
//! the time it arrived. A segment is released once
//! `total_played + lead_bytes >= byte_marker`, i.e. once the audio that came
//! with it is playing or about to play.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::playback::PlaybackBuffer;
use super::transcript::{Segment, TranscriptState};

/// Default wake-up interval of the sync loop.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncScheduler {
    lead_bytes: u64,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(lead_bytes: u64, interval: Duration) -> Self {
        Self {
            lead_bytes,
            interval,
        }
    }

    pub fn lead_bytes(&self) -> u64 {
        self.lead_bytes
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Highest byte marker that may be released at `total_played`.
    pub fn allowed(&self, total_played: u64) -> u64 {
        total_played.saturating_add(self.lead_bytes)
    }

    /// Release every segment that playback has caught up with.
    ///
    /// `emit` runs while the transcript lock is held, so segments reach the
    /// consumer in arrival order even when the inbound loop releases segments
    /// of its own on interruption. `emit` must not block.
    pub fn tick<F>(&self, transcript: &Mutex<TranscriptState>, playback: &PlaybackBuffer, mut emit: F) -> usize
    where
        F: FnMut(Segment),
    {
        let allowed = self.allowed(playback.total_played());
        let mut state = transcript.lock();
        let released = state.release_until(allowed);
        let count = released.len();
        for segment in released {
            trace!(marker = segment.byte_marker, allowed, "releasing segment");
            emit(segment);
        }
        count
    }

    /// Tick every `interval` until `cancel` fires.
    pub async fn run<F>(
        self,
        transcript: Arc<Mutex<TranscriptState>>,
        playback: Arc<PlaybackBuffer>,
        mut emit: F,
        cancel: CancellationToken,
    ) where
        F: FnMut(Segment) + Send,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sync loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(&transcript, &playback, &mut emit);
                }
            }
        }
    }
}
