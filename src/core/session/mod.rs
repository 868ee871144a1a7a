//! Session orchestrator.
//!
//! A [`LiveSession`] owns the transport handle, the playback buffer and the
//! transcript state, and runs four loops for the life of the session:
//!
//! - outbound: captured audio to the transport
//! - inbound: transport events into transcript and playback state, driving the
//!   interruption state machine
//! - sync: releases responder text as its audio plays
//! - control: operator commands (`/text`, `/quit`)
//!
//! The first loop to finish cancels the others.

mod config;
mod control;
mod inbound;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use config::{DEFAULT_OUTPUT_SAMPLE_RATE, DEFAULT_PLAYBACK_LEAD, EngineConfig};
pub use control::{CONTROL_CHANNEL_CAPACITY, ControlCommand, forward_commands, spawn_stdin_reader};
pub use inbound::{InboundProcessor, TurnPhase};

use crate::audio::CaptureQueue;
use crate::core::playback::PlaybackBuffer;
use crate::core::realtime::{LiveTransport, RealtimeError};
use crate::core::resume::{DefaultResumePrompt, SharedPromptBuilder};
use crate::core::sync::SyncScheduler;
use crate::core::transcript::{HistoryTurn, Role, Segment, TranscriptState};

/// Capacity of the session event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] RealtimeError),

    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A piece of transcript delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub role: Role,
    pub text: String,
    pub is_final: bool,
}

/// Output of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User text as soon as it arrives, model text once its audio plays
    Transcript(TranscriptSegment),
    /// The responder was cut off
    Interrupted {
        heard_text: String,
        interruption_count: u64,
    },
    /// A resume prompt was sent to the transport
    ResumeInjected { prompt: String },
}

/// Final state of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub interruption_count: u64,
    pub history: Vec<HistoryTurn>,
}

/// Builder for [`LiveSession`].
pub struct LiveSessionBuilder {
    transport: Arc<dyn LiveTransport>,
    config: EngineConfig,
    prompt_builder: SharedPromptBuilder,
}

impl LiveSessionBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default resume prompt.
    pub fn prompt_builder(mut self, prompt_builder: SharedPromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn build(self) -> LiveSession {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        LiveSession {
            id: Uuid::new_v4(),
            transcript: Arc::new(Mutex::new(TranscriptState::new(self.config.history_window))),
            playback: Arc::new(PlaybackBuffer::new()),
            transport: self.transport,
            config: self.config,
            prompt_builder: self.prompt_builder,
            events,
            cancel: CancellationToken::new(),
        }
    }
}

/// One live dialogue session over a [`LiveTransport`].
pub struct LiveSession {
    id: Uuid,
    transport: Arc<dyn LiveTransport>,
    config: EngineConfig,
    prompt_builder: SharedPromptBuilder,
    transcript: Arc<Mutex<TranscriptState>>,
    playback: Arc<PlaybackBuffer>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl LiveSession {
    pub fn builder(transport: Arc<dyn LiveTransport>) -> LiveSessionBuilder {
        LiveSessionBuilder {
            transport,
            config: EngineConfig::default(),
            prompt_builder: Arc::new(DefaultResumePrompt),
        }
    }

    /// Identifier attached to this session's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Buffer the audio output path reads from.
    pub fn playback(&self) -> Arc<PlaybackBuffer> {
        self.playback.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask every loop to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn interruption_count(&self) -> u64 {
        self.transcript.lock().interruption_count()
    }

    pub fn history(&self) -> Vec<HistoryTurn> {
        self.transcript.lock().history_snapshot()
    }

    /// Run the session until a loop ends or [`shutdown`](Self::shutdown) is
    /// called.
    pub async fn run(
        &self,
        capture: Arc<CaptureQueue>,
        commands: mpsc::Receiver<ControlCommand>,
    ) -> SessionResult<SessionSummary> {
        info!(
            session_id = %self.id,
            history_window = self.config.history_window,
            lead_bytes = self.config.lead_bytes(),
            "Starting live session"
        );
        let mut tasks: JoinSet<(&'static str, SessionResult<()>)> = JoinSet::new();

        {
            let transport = self.transport.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move { ("outbound", run_outbound_loop(transport, capture, cancel).await) });
        }
        {
            let processor = InboundProcessor::new(
                self.transport.clone(),
                self.transcript.clone(),
                self.playback.clone(),
                self.events.clone(),
                self.prompt_builder.clone(),
            );
            let cancel = self.cancel.clone();
            tasks.spawn(async move { ("inbound", processor.run(cancel).await) });
        }
        {
            let scheduler = SyncScheduler::new(self.config.lead_bytes(), self.config.sync_interval);
            let transcript = self.transcript.clone();
            let playback = self.playback.clone();
            let events = self.events.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let emit = move |segment: Segment| {
                    let _ = events.send(SessionEvent::Transcript(TranscriptSegment {
                        role: Role::Model,
                        text: segment.text,
                        is_final: segment.is_final,
                    }));
                };
                scheduler.run(transcript, playback, emit, cancel).await;
                ("sync", Ok(()))
            });
        }
        {
            let transport = self.transport.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move { ("control", control::run_control_loop(transport, commands, cancel).await) });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            // Any loop ending ends the session.
            self.cancel.cancel();
            match joined {
                Ok((name, Ok(()))) => debug!("{} loop finished", name),
                Ok((name, Err(e))) => {
                    warn!("{} loop failed: {}", name, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!("session task aborted: {}", e);
                    first_error.get_or_insert(SessionError::TaskFailed(e.to_string()));
                }
            }
        }

        if let Err(e) = self.transport.send_audio_stream_end().await {
            debug!("audio stream end not sent: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            debug!("transport close failed: {}", e);
        }

        let summary = {
            let state = self.transcript.lock();
            SessionSummary {
                interruption_count: state.interruption_count(),
                history: state.history_snapshot(),
            }
        };
        info!(
            session_id = %self.id,
            interruption_count = summary.interruption_count,
            "Live session ended"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

async fn run_outbound_loop(
    transport: Arc<dyn LiveTransport>,
    capture: Arc<CaptureQueue>,
    cancel: CancellationToken,
) -> SessionResult<()> {
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("outbound loop cancelled");
                return Ok(());
            }
            chunk = capture.pop() => chunk,
        };
        transport.send_audio(chunk).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        struct Nothing;
        #[async_trait::async_trait]
        impl LiveTransport for Nothing {
            async fn send_audio(&self, _audio: bytes::Bytes) -> crate::core::realtime::RealtimeResult<()> {
                Ok(())
            }
            async fn send_turn(&self, _text: &str) -> crate::core::realtime::RealtimeResult<()> {
                Ok(())
            }
            async fn send_audio_stream_end(&self) -> crate::core::realtime::RealtimeResult<()> {
                Ok(())
            }
            async fn next_event(
                &self,
            ) -> crate::core::realtime::RealtimeResult<Option<crate::core::realtime::LiveEvent>> {
                Ok(None)
            }
            fn connection_state(&self) -> crate::core::realtime::ConnectionState {
                crate::core::realtime::ConnectionState::Connected
            }
            async fn close(&self) -> crate::core::realtime::RealtimeResult<()> {
                Ok(())
            }
        }

        let session = LiveSession::builder(Arc::new(Nothing)).build();
        assert_eq!(session.config(), &EngineConfig::default());
        assert_eq!(session.interruption_count(), 0);
        assert!(session.history().is_empty());
        assert_eq!(session.playback().total_received(), 0);
    }

    #[test]
    fn test_session_error_from_realtime() {
        let err: SessionError = RealtimeError::ConnectionClosed("bye".to_string()).into();
        assert!(matches!(err, SessionError::Transport(RealtimeError::ConnectionClosed(_))));
        assert!(err.to_string().starts_with("Transport error"));
    }
}
