//! Scripted in-process transport for driving a session from tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, Semaphore, mpsc};

use live_transcript::core::realtime::{
    ConnectionState, LiveEvent, LiveTransport, RealtimeError, RealtimeResult,
};

/// Transport whose events are pushed by the test and whose sends are
/// recorded.
pub struct ScriptedTransport {
    events: Mutex<mpsc::UnboundedReceiver<RealtimeResult<LiveEvent>>>,
    acknowledges: bool,
    pub audio: parking_lot::Mutex<Vec<Bytes>>,
    pub turns: parking_lot::Mutex<Vec<String>>,
    pub stream_ended: AtomicBool,
    pub closed: AtomicBool,
    /// Set once `send_turn` has been entered
    pub turn_started: AtomicBool,
    /// When present, `send_turn` holds until a permit is added
    turn_gate: Option<Semaphore>,
    calls: parking_lot::Mutex<Vec<&'static str>>,
}

/// Feeding side of a [`ScriptedTransport`]. Dropping it ends the event
/// stream.
pub struct Script {
    tx: mpsc::UnboundedSender<RealtimeResult<LiveEvent>>,
}

impl Script {
    pub fn push(&self, event: LiveEvent) {
        let _ = self.tx.send(Ok(event));
    }

    pub fn fail(&self, error: RealtimeError) {
        let _ = self.tx.send(Err(error));
    }

    pub fn model_text(&self, text: &str) {
        self.push(LiveEvent::ModelTranscript {
            text: text.to_string(),
            finished: false,
        });
    }

    pub fn model_audio(&self, len: usize) {
        self.push(LiveEvent::ModelAudio(Bytes::from(vec![0u8; len])));
    }

    pub fn user_text(&self, text: &str, finished: bool) {
        self.push(LiveEvent::UserTranscript {
            text: text.to_string(),
            finished,
        });
    }
}

fn build(acknowledges: bool, turn_gate: Option<Semaphore>) -> (Arc<ScriptedTransport>, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = ScriptedTransport {
        events: Mutex::new(rx),
        acknowledges,
        audio: parking_lot::Mutex::new(Vec::new()),
        turns: parking_lot::Mutex::new(Vec::new()),
        stream_ended: AtomicBool::new(false),
        closed: AtomicBool::new(false),
        turn_started: AtomicBool::new(false),
        turn_gate,
        calls: parking_lot::Mutex::new(Vec::new()),
    };
    (Arc::new(transport), Script { tx })
}

pub fn scripted(acknowledges: bool) -> (Arc<ScriptedTransport>, Script) {
    build(acknowledges, None)
}

/// Like [`scripted`], but every `send_turn` blocks until
/// [`ScriptedTransport::release_turns`] is called.
pub fn scripted_with_turn_gate(acknowledges: bool) -> (Arc<ScriptedTransport>, Script) {
    build(acknowledges, Some(Semaphore::new(0)))
}

impl ScriptedTransport {
    pub fn turns(&self) -> Vec<String> {
        self.turns.lock().clone()
    }

    /// Order of completed turn, stream-end and close calls.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Let every pending and future `send_turn` through.
    pub fn release_turns(&self) {
        if let Some(gate) = &self.turn_gate {
            gate.close();
        }
    }
}

#[async_trait]
impl LiveTransport for ScriptedTransport {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.audio.lock().push(audio);
        Ok(())
    }

    async fn send_turn(&self, text: &str) -> RealtimeResult<()> {
        self.turn_started.store(true, Ordering::SeqCst);
        if let Some(gate) = &self.turn_gate {
            let _permit = gate.acquire().await;
        }
        self.turns.lock().push(text.to_string());
        self.calls.lock().push("turn");
        Ok(())
    }

    async fn send_audio_stream_end(&self) -> RealtimeResult<()> {
        self.stream_ended.store(true, Ordering::SeqCst);
        self.calls.lock().push("stream_end");
        Ok(())
    }

    async fn next_event(&self) -> RealtimeResult<Option<LiveEvent>> {
        self.events.lock().await.recv().await.transpose()
    }

    fn acknowledges_turns(&self) -> bool {
        self.acknowledges
    }

    fn connection_state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.calls.lock().push("close");
        Ok(())
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

/// Await `future`, failing the test after five seconds.
pub async fn within<T>(what: &str, future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(5), future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}
