//! Inbound event handling and the interruption state machine.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{SessionEvent, SessionResult, TranscriptSegment};
use crate::core::continuation::find_continuation;
use crate::core::playback::PlaybackBuffer;
use crate::core::realtime::{LiveEvent, LiveTransport, TurnCompleteInfo};
use crate::core::resume::{ResumeDirective, SharedPromptBuilder};
use crate::core::transcript::{Role, TranscriptState};

/// Phase of the responder's current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    /// No responder turn in progress
    #[default]
    Idle,
    /// Responder content is arriving
    Speaking,
    /// Interruption being processed
    Interrupted,
    /// Waiting for the interrupted turn to be closed by the server
    Resuming,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Idle => write!(f, "idle"),
            TurnPhase::Speaking => write!(f, "speaking"),
            TurnPhase::Interrupted => write!(f, "interrupted"),
            TurnPhase::Resuming => write!(f, "resuming"),
        }
    }
}

/// Sole writer of per-turn transcript state and of the playback buffer's
/// input side.
pub struct InboundProcessor {
    transport: Arc<dyn LiveTransport>,
    transcript: Arc<Mutex<TranscriptState>>,
    playback: Arc<PlaybackBuffer>,
    events: broadcast::Sender<SessionEvent>,
    prompt_builder: SharedPromptBuilder,
    phase: TurnPhase,
}

impl InboundProcessor {
    pub fn new(
        transport: Arc<dyn LiveTransport>,
        transcript: Arc<Mutex<TranscriptState>>,
        playback: Arc<PlaybackBuffer>,
        events: broadcast::Sender<SessionEvent>,
        prompt_builder: SharedPromptBuilder,
    ) -> Self {
        Self {
            transport,
            transcript,
            playback,
            events,
            prompt_builder,
            phase: TurnPhase::Idle,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "turn phase");
            self.phase = phase;
        }
    }

    /// Process events in arrival order until the transport closes or `cancel`
    /// fires. An event already being handled is always finished.
    pub async fn run(mut self, cancel: CancellationToken) -> SessionResult<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("inbound loop cancelled");
                    return Ok(());
                }
                next = self.transport.next_event() => {
                    match next? {
                        Some(event) => self.handle(event).await?,
                        None => {
                            info!("Transport closed the event stream");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    pub async fn handle(&mut self, event: LiveEvent) -> SessionResult<()> {
        match event {
            LiveEvent::UserTranscript { text, finished } => {
                self.on_user_transcript(&text, finished);
            }
            LiveEvent::ModelTranscript { text, finished } => {
                self.on_model_transcript(&text, finished);
            }
            LiveEvent::ModelAudio(data) => {
                if self.phase == TurnPhase::Resuming {
                    trace!(bytes = data.len(), "dropping audio of interrupted turn");
                    return Ok(());
                }
                self.playback.append(&data);
                self.begin_speaking();
            }
            LiveEvent::ModelText(text) => debug!("model-text {}", text),
            LiveEvent::Interrupted => self.on_interrupted().await?,
            LiveEvent::GenerationComplete => debug!("generation_complete=true"),
            LiveEvent::TurnComplete(info) => self.on_turn_complete(&info),
            LiveEvent::GoAway { time_left } => {
                debug!("go_away time_left={}", time_left.as_deref().unwrap_or("unknown"))
            }
            LiveEvent::VoiceActivity(kind) => debug!("voice_activity={}", kind),
            LiveEvent::SessionResumption(update) => debug!(
                "session_resumption_update resumable={:?} last_consumed_client_message_index={:?}",
                update.resumable, update.last_consumed_client_message_index
            ),
            LiveEvent::ToolCall(_) => debug!("tool_call received"),
            LiveEvent::ToolCallCancellation(_) => debug!("tool_call_cancellation received"),
            LiveEvent::UsageMetadata(usage) => trace!("usage_metadata {}", usage),
            LiveEvent::SetupComplete => debug!("setup_complete"),
        }
        Ok(())
    }

    fn on_user_transcript(&mut self, text: &str, finished: bool) {
        let accepted = {
            let mut state = self.transcript.lock();
            if finished {
                state.finalize_user(text)
            } else {
                state.record_user_partial(text)
            }
        };
        if let Some(text) = accepted {
            self.emit(SessionEvent::Transcript(TranscriptSegment {
                role: Role::User,
                text,
                is_final: finished,
            }));
        }
    }

    fn on_model_transcript(&mut self, text: &str, finished: bool) {
        if self.phase == TurnPhase::Resuming {
            trace!("dropping transcript of interrupted turn: {}", text);
            return;
        }
        let marker = self.playback.total_received();
        let recorded = self
            .transcript
            .lock()
            .record_model_chunk(text, marker, finished);
        if recorded.is_some() {
            self.begin_speaking();
        }
    }

    fn begin_speaking(&mut self) {
        if self.phase == TurnPhase::Idle {
            self.transcript.lock().begin_model_turn();
            self.set_phase(TurnPhase::Speaking);
        }
    }

    async fn on_interrupted(&mut self) -> SessionResult<()> {
        if self.phase != TurnPhase::Speaking {
            let dropped = self.playback.clear();
            debug!(phase = %self.phase, dropped, "interruption outside a responder turn");
            return Ok(());
        }
        self.set_phase(TurnPhase::Interrupted);

        let played = self.playback.total_played();
        let snapshot = {
            let mut state = self.transcript.lock();
            let snapshot = state.snapshot_for_interruption(played);
            // Heard segments go out before anything recorded later.
            for segment in &snapshot.released {
                let _ = self.events.send(SessionEvent::Transcript(TranscriptSegment {
                    role: Role::Model,
                    text: segment.text.clone(),
                    is_final: segment.is_final,
                }));
            }
            snapshot
        };

        // Never under the transcript lock.
        let dropped = self.playback.clear();
        debug!(played, dropped, "cleared playback on interruption");

        let (history, interruption_count) = {
            let mut state = self.transcript.lock();
            let history = state.history_snapshot();
            state.record_interruption(&snapshot);
            (history, state.interruption_count())
        };

        let continuation = find_continuation(&snapshot.full_text, &snapshot.heard_text);
        let prompt = if continuation.is_empty() {
            None
        } else {
            Some(self.prompt_builder.build(&ResumeDirective {
                heard_text: snapshot.heard_text.clone(),
                unheard_text: snapshot.unheard_text.clone(),
                user_interrupt_text: snapshot.user_text.clone(),
                continuation_text: continuation,
                history_snapshot: history,
            }))
        };
        self.transcript.lock().set_needs_resume(prompt.is_some());

        info!(
            interruption_count,
            heard = %snapshot.heard_text,
            "[MODEL][INTERRUPTED]"
        );
        self.emit(SessionEvent::Interrupted {
            heard_text: snapshot.heard_text,
            interruption_count,
        });

        match prompt {
            Some(prompt) => {
                info!("[RESUME CONTEXT] injected ({} chars):", prompt.len());
                for line in prompt.lines() {
                    info!("  | {}", line);
                }
                self.transport.send_turn(&prompt).await?;
                self.transcript.lock().set_needs_resume(false);
                self.emit(SessionEvent::ResumeInjected { prompt });
            }
            None => debug!("utterance was fully heard, no resume needed"),
        }

        if self.transport.acknowledges_turns() {
            self.set_phase(TurnPhase::Resuming);
        } else {
            self.set_phase(TurnPhase::Idle);
        }
        Ok(())
    }

    fn on_turn_complete(&mut self, info: &TurnCompleteInfo) {
        debug!(
            "turn_complete=true reason={} waiting_for_input={:?}",
            info.reason.as_deref().unwrap_or("UNKNOWN"),
            info.waiting_for_input
        );
        match self.phase {
            TurnPhase::Speaking => {
                if let Some(text) = self.transcript.lock().finalize_model_turn() {
                    trace!("model turn recorded: {}", text);
                }
                self.set_phase(TurnPhase::Idle);
            }
            TurnPhase::Resuming | TurnPhase::Interrupted => self.set_phase(TurnPhase::Idle),
            TurnPhase::Idle => {}
        }
    }
}
