//! Base traits and types for live bidirectional speech transports.
//!
//! A transport carries captured audio to the remote model and yields the
//! model's audio, transcriptions and turn signals back as [`LiveEvent`]s.
//! The session engine only talks to the [`LiveTransport`] trait, so the
//! concrete WebSocket client can be swapped for a scripted one in tests.
//!
//! # Audio Format
//!
//! Input and output audio are PCM 16-bit signed little-endian mono. The input
//! rate is announced in each audio message; output arrives at the model's
//! native rate (24kHz for Gemini Live).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to a live transport.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// The server refused the session setup
    #[error("Setup rejected: {0}")]
    SetupRejected(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The server closed the connection
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationError(err.to_string())
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Socket open, waiting for setup to be acknowledged
    Connecting,
    /// Setup acknowledged, streaming
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Details attached to a turn-complete signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnCompleteInfo {
    /// Why the turn ended, as reported by the server
    pub reason: Option<String>,
    /// Whether the server is now waiting for user input
    pub waiting_for_input: Option<bool>,
}

/// Session resumption handle update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumptionUpdate {
    pub resumable: Option<bool>,
    pub new_handle: Option<String>,
    pub last_consumed_client_message_index: Option<String>,
}

/// Typed event yielded by a transport, in server arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// The session setup was acknowledged
    SetupComplete,
    /// Transcription of the user's speech
    UserTranscript { text: String, finished: bool },
    /// Transcription of the model's spoken output
    ModelTranscript { text: String, finished: bool },
    /// A chunk of the model's audio output
    ModelAudio(Bytes),
    /// Text part of the model's turn (not spoken)
    ModelText(String),
    /// The user started speaking while the model was talking
    Interrupted,
    /// The model finished generating this turn
    GenerationComplete,
    /// The model's turn is over
    TurnComplete(TurnCompleteInfo),
    /// The server will close the connection soon
    GoAway { time_left: Option<String> },
    /// Voice activity detection signal or voice activity update
    VoiceActivity(String),
    SessionResumption(ResumptionUpdate),
    ToolCall(serde_json::Value),
    ToolCallCancellation(serde_json::Value),
    UsageMetadata(serde_json::Value),
}

impl LiveEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::SetupComplete => "setup_complete",
            LiveEvent::UserTranscript { .. } => "user_transcript",
            LiveEvent::ModelTranscript { .. } => "model_transcript",
            LiveEvent::ModelAudio(_) => "model_audio",
            LiveEvent::ModelText(_) => "model_text",
            LiveEvent::Interrupted => "interrupted",
            LiveEvent::GenerationComplete => "generation_complete",
            LiveEvent::TurnComplete(_) => "turn_complete",
            LiveEvent::GoAway { .. } => "go_away",
            LiveEvent::VoiceActivity(_) => "voice_activity",
            LiveEvent::SessionResumption(_) => "session_resumption_update",
            LiveEvent::ToolCall(_) => "tool_call",
            LiveEvent::ToolCallCancellation(_) => "tool_call_cancellation",
            LiveEvent::UsageMetadata(_) => "usage_metadata",
        }
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Bidirectional live speech transport.
///
/// Implementations serialize their own sends: each call either writes one
/// whole message or fails, never a fragment. `next_event` is driven by a
/// single consumer.
///
/// # Example
///
/// ```rust,ignore
/// use live_transcript::core::realtime::{GeminiLiveClient, LiveTransport};
///
/// let client = GeminiLiveClient::connect(config).await?;
/// client.send_audio(pcm_chunk).await?;
/// while let Some(event) = client.next_event().await? {
///     println!("{}", event.kind());
/// }
/// ```
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Stream a chunk of captured PCM16 audio.
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()>;

    /// Send a complete user turn as text. The turn is marked complete so the
    /// model responds to it.
    async fn send_turn(&self, text: &str) -> RealtimeResult<()>;

    /// Tell the server the audio stream has ended.
    async fn send_audio_stream_end(&self) -> RealtimeResult<()>;

    /// Next event, or `None` once the connection has closed cleanly.
    async fn next_event(&self) -> RealtimeResult<Option<LiveEvent>>;

    /// Whether the server signals turn completion after an injected turn.
    fn acknowledges_turns(&self) -> bool {
        true
    }

    fn connection_state(&self) -> ConnectionState;

    /// Close the connection. Safe to call more than once.
    async fn close(&self) -> RealtimeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");

        let err = RealtimeError::SetupRejected("unknown name".to_string());
        assert_eq!(err.to_string(), "Setup rejected: unknown name");
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: RealtimeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, RealtimeError::SerializationError(_)));
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(LiveEvent::Interrupted.kind(), "interrupted");
        assert_eq!(
            LiveEvent::TurnComplete(TurnCompleteInfo::default()).kind(),
            "turn_complete"
        );
        assert_eq!(LiveEvent::ModelAudio(Bytes::new()).kind(), "model_audio");
    }
}
