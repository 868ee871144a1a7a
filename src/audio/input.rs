//! Capture side: the bounded queue feeding the outbound loop and a WAV file
//! capture source.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AudioError, AudioResult, BLOCK_DURATION, bytes_for_duration};

/// Maximum number of chunks held before the oldest is dropped.
pub const CAPTURE_QUEUE_CAPACITY: usize = 128;

/// Bounded single-consumer queue of captured PCM chunks.
///
/// Producers never block: when the queue is full the oldest chunk is dropped,
/// so a stalled transport costs stale audio instead of unbounded memory.
#[derive(Debug)]
pub struct CaptureQueue {
    chunks: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    notify: Notify,
}

impl Default for CaptureQueue {
    fn default() -> Self {
        Self::new(CAPTURE_QUEUE_CAPACITY)
    }
}

impl CaptureQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Enqueue a chunk. Returns `true` if an older chunk had to be dropped.
    pub fn push(&self, chunk: impl Into<Bytes>) -> bool {
        let dropped = {
            let mut chunks = self.chunks.lock();
            let dropped = if chunks.len() >= self.capacity {
                chunks.pop_front();
                true
            } else {
                false
            };
            chunks.push_back(chunk.into());
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    pub fn try_pop(&self) -> Option<Bytes> {
        self.chunks.lock().pop_front()
    }

    /// Wait for the next chunk.
    pub async fn pop(&self) -> Bytes {
        loop {
            if let Some(chunk) = self.try_pop() {
                return chunk;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }
}

/// Streams a 16-bit mono WAV file into a [`CaptureQueue`] at real-time pace,
/// then keeps the stream alive with silence.
#[derive(Debug)]
pub struct WavCaptureSource {
    pcm: Vec<u8>,
    sample_rate: u32,
}

impl WavCaptureSource {
    /// Open `path`, which must be PCM16 mono at `sample_rate`.
    pub fn open(path: impl AsRef<Path>, sample_rate: u32) -> AudioResult<Self> {
        let mut reader = hound::WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        if spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(AudioError::UnsupportedFormat(format!(
                "expected 16-bit mono PCM, got {} channel(s) at {} bits",
                spec.channels, spec.bits_per_sample
            )));
        }
        if spec.sample_rate != sample_rate {
            return Err(AudioError::UnsupportedFormat(format!(
                "expected {sample_rate} Hz, got {} Hz",
                spec.sample_rate
            )));
        }

        let mut pcm = Vec::with_capacity(reader.len() as usize * 2);
        for sample in reader.samples::<i16>() {
            pcm.extend_from_slice(&sample?.to_le_bytes());
        }

        info!(
            path = %path.as_ref().display(),
            bytes = pcm.len(),
            "Loaded capture WAV"
        );
        Ok(Self { pcm, sample_rate })
    }

    pub fn from_pcm(pcm: Vec<u8>, sample_rate: u32) -> Self {
        Self { pcm, sample_rate }
    }

    pub fn len_bytes(&self) -> usize {
        self.pcm.len()
    }

    /// Push one block every [`BLOCK_DURATION`] until cancelled.
    pub async fn run(self, queue: Arc<CaptureQueue>, cancel: CancellationToken) {
        let block = bytes_for_duration(BLOCK_DURATION, self.sample_rate).max(2);
        let silence = Bytes::from(vec![0u8; block]);
        let pcm = Bytes::from(self.pcm);
        let mut offset = 0;

        let mut ticker = tokio::time::interval(BLOCK_DURATION);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("capture source cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let chunk = if offset < pcm.len() {
                        let end = (offset + block).min(pcm.len());
                        let chunk = pcm.slice(offset..end);
                        offset = end;
                        if offset >= pcm.len() {
                            info!("Capture file exhausted, sending silence");
                        }
                        chunk
                    } else {
                        silence.clone()
                    };
                    if queue.push(chunk) {
                        warn!("capture queue full, dropped oldest chunk");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_queue_drops_oldest_on_overflow() {
        let queue = CaptureQueue::new(2);
        assert!(!queue.push(vec![1u8]));
        assert!(!queue.push(vec![2u8]));
        assert!(queue.push(vec![3u8]));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().unwrap().as_ref(), &[2]);
        assert_eq!(queue.try_pop().unwrap().as_ref(), &[3]);
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(CaptureQueue::default());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(vec![4u8, 2]);

        let chunk = waiter.await.unwrap();
        assert_eq!(chunk.as_ref(), &[4, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_open_rejects_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let err = WavCaptureSource::open(&path, 16000).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_open_reads_little_endian_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(1i16).unwrap();
        writer.write_sample(-1i16).unwrap();
        writer.finalize().unwrap();

        let source = WavCaptureSource::open(&path, 16000).unwrap();
        assert_eq!(source.pcm, vec![1, 0, 0xff, 0xff]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_streams_file_then_silence() {
        // 1.5 blocks of audio at 16kHz
        let source = WavCaptureSource::from_pcm(vec![7u8; 4800], 16000);
        let queue = Arc::new(CaptureQueue::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(source.run(queue.clone(), cancel.clone()));

        let first = queue.pop().await;
        let second = queue.pop().await;
        let third = queue.pop().await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(first.len(), 3200);
        assert_eq!(second.len(), 1600);
        assert!(second.iter().all(|b| *b == 7));
        assert_eq!(third.len(), 3200);
        assert!(third.iter().all(|b| *b == 0));
    }
}
