//! Playback buffer bridging received model audio and the playback device.
//!
//! The buffer is the only mutable resource shared between the inbound event
//! path (which appends audio and clears it on interruption) and the audio
//! output path (which drains it). Every operation takes the same lock, so an
//! `append`, `read` or `clear` is never observed half-applied.
//!
//! Two counters are kept for the lifetime of a session:
//! - `total_received`: bytes ever appended
//! - `total_played`: bytes ever drained towards the device
//!
//! Both only grow, and `total_played <= total_received` always holds. Text
//! segments are anchored to `total_received` at arrival, and released once
//! `total_played` catches up (see [`crate::core::sync`]).

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

/// Counters and queue contents read under a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStats {
    pub total_received: u64,
    pub total_played: u64,
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<u8>,
    total_received: u64,
    total_played: u64,
}

/// Thread-safe byte queue with monotonic received/played counters.
#[derive(Debug, Default)]
pub struct PlaybackBuffer {
    inner: Mutex<Inner>,
}

impl PlaybackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue audio bytes received from the remote party.
    pub fn append(&self, chunk: &[u8]) {
        let mut inner = self.inner.lock();
        inner.queue.extend(chunk);
        inner.total_received += chunk.len() as u64;
    }

    /// Drain up to `max_bytes` queued bytes.
    ///
    /// Returns fewer bytes than requested (possibly none) on under-run; the
    /// caller pads the remainder with silence.
    pub fn read(&self, max_bytes: usize) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let size = max_bytes.min(inner.queue.len());
        let out: Vec<u8> = inner.queue.drain(..size).collect();
        inner.total_played += size as u64;
        out
    }

    /// Fill `out` from the queue, padding any shortfall with silence.
    ///
    /// Returns how many bytes came from the queue.
    pub fn read_into(&self, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock();
        let size = out.len().min(inner.queue.len());
        for (dst, src) in out.iter_mut().zip(inner.queue.drain(..size)) {
            *dst = src;
        }
        out[size..].fill(0);
        inner.total_played += size as u64;
        size
    }

    /// Drop all queued, unplayed audio. Neither counter changes.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.queue.len();
        inner.queue.clear();
        dropped
    }

    pub fn total_received(&self) -> u64 {
        self.inner.lock().total_received
    }

    pub fn total_played(&self) -> u64 {
        self.inner.lock().total_played
    }

    pub fn stats(&self) -> PlaybackStats {
        let inner = self.inner.lock();
        PlaybackStats {
            total_received: inner.total_received,
            total_played: inner.total_played,
            queued: inner.queue.len(),
        }
    }

    /// Duration of audio still queued, for PCM16 mono at `sample_rate`.
    pub fn backlog(&self, sample_rate: u32) -> Duration {
        let queued = self.inner.lock().queue.len() as u64;
        crate::audio::duration_for_bytes(queued, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_and_read_counters() {
        let buffer = PlaybackBuffer::new();
        buffer.append(&[1, 2, 3, 4]);
        buffer.append(&[5, 6]);
        assert_eq!(buffer.total_received(), 6);

        let out = buffer.read(4);
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(buffer.total_played(), 4);

        let stats = buffer.stats();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.total_received, 6);
    }

    #[test]
    fn test_read_underrun_returns_fewer_bytes() {
        let buffer = PlaybackBuffer::new();
        assert!(buffer.read(100).is_empty());
        assert_eq!(buffer.total_played(), 0);

        buffer.append(&[9; 10]);
        let out = buffer.read(100);
        assert_eq!(out.len(), 10);
        assert_eq!(buffer.total_played(), 10);
    }

    #[test]
    fn test_read_into_pads_with_silence() {
        let buffer = PlaybackBuffer::new();
        buffer.append(&[7, 7, 7]);

        let mut block = [1u8; 6];
        let filled = buffer.read_into(&mut block);

        assert_eq!(filled, 3);
        assert_eq!(block, [7, 7, 7, 0, 0, 0]);
        assert_eq!(buffer.total_played(), 3);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let buffer = PlaybackBuffer::new();
        buffer.append(&[0; 300]);
        buffer.read(120);

        let dropped = buffer.clear();

        assert_eq!(dropped, 180);
        assert_eq!(buffer.total_received(), 300);
        assert_eq!(buffer.total_played(), 120);
        assert!(buffer.read(10).is_empty());
    }

    #[test]
    fn test_played_never_exceeds_received() {
        let buffer = PlaybackBuffer::new();
        let ops: [(usize, usize); 6] = [(10, 3), (0, 50), (7, 7), (100, 1), (0, 0), (3, 200)];
        for (append, read) in ops {
            buffer.append(&vec![1; append]);
            let stats = buffer.stats();
            assert!(stats.total_played <= stats.total_received);
            buffer.read(read);
            let stats = buffer.stats();
            assert!(stats.total_played <= stats.total_received);
        }
    }

    #[test]
    fn test_backlog_duration() {
        let buffer = PlaybackBuffer::new();
        // 100ms of PCM16 mono at 24kHz
        buffer.append(&vec![0; 4800]);
        assert_eq!(buffer.backlog(24000), Duration::from_millis(100));
    }

    #[test]
    fn test_concurrent_append_and_read() {
        let buffer = Arc::new(PlaybackBuffer::new());

        let writer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    buffer.append(&[1; 48]);
                }
            })
        };
        let reader = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    buffer.read(32);
                    let stats = buffer.stats();
                    assert!(stats.total_played <= stats.total_received);
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.total_received, 48_000);
        assert_eq!(
            stats.total_played + stats.queued as u64,
            stats.total_received
        );
    }
}
