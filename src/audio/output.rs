//! Playback side: a clock that drains the playback buffer in fixed blocks
//! and hands them to an [`AudioSink`].
//!
//! The clock stands in for a device output callback. It ticks at real-time
//! pace whether or not audio is queued; only bytes actually taken from the
//! buffer count towards `total_played`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{AudioResult, BLOCK_DURATION, bytes_for_duration};
use crate::core::playback::PlaybackBuffer;

/// Destination for played blocks.
pub trait AudioSink: Send {
    fn write_block(&mut self, block: &[u8]) -> AudioResult<()>;

    /// Flush and close. Called once when playback stops.
    fn finish(&mut self) -> AudioResult<()> {
        Ok(())
    }
}

/// Drops every block.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl AudioSink for DiscardSink {
    fn write_block(&mut self, _block: &[u8]) -> AudioResult<()> {
        Ok(())
    }
}

/// Writes played audio, silence included, to a PCM16 mono WAV file.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> AudioResult<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path.as_ref(), spec)?;
        info!(path = %path.as_ref().display(), "Writing playback to WAV");
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl AudioSink for WavSink {
    fn write_block(&mut self, block: &[u8]) -> AudioResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            for pair in block.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> AudioResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

/// Pulls one block from the playback buffer per period.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    block_bytes: usize,
    period: Duration,
}

impl PlaybackClock {
    /// 100 ms blocks at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            block_bytes: bytes_for_duration(BLOCK_DURATION, sample_rate).max(2),
            period: BLOCK_DURATION,
        }
    }

    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// Pull a single block into `sink`. Returns bytes taken from the buffer.
    pub fn pull(&self, playback: &PlaybackBuffer, block: &mut [u8], sink: &mut dyn AudioSink) -> AudioResult<usize> {
        let filled = playback.read_into(block);
        sink.write_block(block)?;
        Ok(filled)
    }

    pub async fn run(
        self,
        playback: Arc<PlaybackBuffer>,
        mut sink: Box<dyn AudioSink>,
        cancel: CancellationToken,
    ) -> AudioResult<()> {
        let mut block = vec![0u8; self.block_bytes];
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("playback clock cancelled");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.pull(&playback, &mut block, sink.as_mut()) {
                        error!("Playback sink failed: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        sink.finish()?;
        result
    }
}
