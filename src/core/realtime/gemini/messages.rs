//! Gemini Live WebSocket message types.
//!
//! All messages are JSON objects keyed by their kind, with camelCase fields.
//!
//! # Protocol Overview
//!
//! Client messages (sent to server):
//! - setup - Session configuration, first message on the socket
//! - realtimeInput - Streamed audio, or the end-of-stream marker
//! - clientContent - Complete conversation turns
//!
//! Server messages (received from server):
//! - setupComplete - Setup accepted
//! - serverContent - Model audio, transcriptions and turn signals
//! - goAway - Server will disconnect soon
//! - sessionResumptionUpdate - New resumption handle
//! - toolCall / toolCallCancellation - Function calling
//! - voiceActivityDetectionSignal / voiceActivity - VAD updates
//! - usageMetadata - Token accounting

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::super::base::{LiveEvent, ResumptionUpdate, TurnCompleteInfo};
use super::config::GeminiLiveConfig;
use crate::audio::pcm_mime_type;

// =============================================================================
// Shared Types
// =============================================================================

/// Inline binary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// Base64 encoded bytes
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }
}

// =============================================================================
// Setup
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_affective_dialog: Option<bool>,
}

/// Transcription settings for one direction. An empty object asks for the
/// server's default transcriber.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTranscriptionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticActivityDetection {
    pub disabled: bool,
    pub start_of_speech_sensitivity: String,
    pub end_of_speech_sensitivity: String,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for AutomaticActivityDetection {
    fn default() -> Self {
        Self {
            disabled: false,
            start_of_speech_sensitivity: "START_SENSITIVITY_HIGH".to_string(),
            end_of_speech_sensitivity: "END_SENSITIVITY_HIGH".to_string(),
            prefix_padding_ms: 300,
            silence_duration_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputConfig {
    pub automatic_activity_detection: AutomaticActivityDetection,
    pub activity_handling: String,
    pub turn_coverage: String,
}

impl Default for RealtimeInputConfig {
    fn default() -> Self {
        Self {
            automatic_activity_detection: AutomaticActivityDetection::default(),
            activity_handling: "START_OF_ACTIVITY_INTERRUPTS".to_string(),
            turn_coverage: "TURN_INCLUDES_ALL_INPUT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProactivityConfig {
    pub proactive_audio: bool,
}

/// First message on the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub input_audio_transcription: AudioTranscriptionConfig,
    pub output_audio_transcription: AudioTranscriptionConfig,
    pub realtime_input_config: RealtimeInputConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proactivity: Option<ProactivityConfig>,
}

impl Setup {
    pub fn from_config(config: &GeminiLiveConfig) -> Self {
        let transcription = AudioTranscriptionConfig {
            model: config.transcription_model.clone(),
        };
        Self {
            model: config.model_resource(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice_name.clone(),
                        },
                    },
                }),
                enable_affective_dialog: Some(config.enable_affective_dialog),
            },
            system_instruction: config
                .system_instruction
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| Content::text(None, s)),
            input_audio_transcription: transcription.clone(),
            output_audio_transcription: transcription,
            realtime_input_config: RealtimeInputConfig::default(),
            proactivity: Some(ProactivityConfig {
                proactive_audio: config.enable_proactive_audio,
            }),
        }
    }
}

// =============================================================================
// Client Messages
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
}

impl ClientMessage {
    pub fn setup(config: &GeminiLiveConfig) -> Self {
        ClientMessage::Setup(Setup::from_config(config))
    }

    /// A chunk of PCM16 audio at `sample_rate`.
    pub fn audio(pcm: &[u8], sample_rate: u32) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: Some(Blob {
                data: BASE64_STANDARD.encode(pcm),
                mime_type: pcm_mime_type(sample_rate),
            }),
            audio_stream_end: None,
        })
    }

    pub fn audio_stream_end() -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            audio: None,
            audio_stream_end: Some(true),
        })
    }

    /// A complete user turn made of one text part.
    pub fn user_turn(text: &str) -> Self {
        ClientMessage::ClientContent(ClientContent {
            turns: vec![Content::text(Some("user"), text)],
            turn_complete: true,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server Messages
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub finished: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub generation_complete: Option<bool>,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub turn_complete_reason: Option<String>,
    #[serde(default)]
    pub waiting_for_input: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResumptionUpdate {
    #[serde(default)]
    pub new_handle: Option<String>,
    #[serde(default)]
    pub resumable: Option<bool>,
    #[serde(default)]
    pub last_consumed_client_message_index: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VadSignal {
    #[serde(default)]
    pub vad_signal_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceActivity {
    #[serde(default)]
    pub voice_activity_type: Option<String>,
}

/// One frame from the server. Several fields may be set at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
    #[serde(default)]
    pub session_resumption_update: Option<SessionResumptionUpdate>,
    #[serde(default)]
    pub tool_call: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_call_cancellation: Option<serde_json::Value>,
    #[serde(default)]
    pub voice_activity_detection_signal: Option<VadSignal>,
    #[serde(default)]
    pub voice_activity: Option<VoiceActivity>,
    #[serde(default)]
    pub usage_metadata: Option<serde_json::Value>,
}

impl ServerMessage {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Flatten into events. Within server content the order is: input
    /// transcription, output transcription, model parts, interrupted,
    /// generation complete, turn complete.
    pub fn into_events(self) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(LiveEvent::SetupComplete);
        }
        if let Some(go_away) = self.go_away {
            events.push(LiveEvent::GoAway {
                time_left: go_away.time_left,
            });
        }
        if let Some(signal) = self.voice_activity_detection_signal {
            events.push(LiveEvent::VoiceActivity(
                signal.vad_signal_type.unwrap_or_else(|| "UNKNOWN".to_string()),
            ));
        }
        if let Some(activity) = self.voice_activity {
            events.push(LiveEvent::VoiceActivity(
                activity
                    .voice_activity_type
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
            ));
        }
        if let Some(update) = self.session_resumption_update {
            events.push(LiveEvent::SessionResumption(ResumptionUpdate {
                resumable: update.resumable,
                new_handle: update.new_handle,
                last_consumed_client_message_index: update.last_consumed_client_message_index,
            }));
        }
        if let Some(call) = self.tool_call {
            events.push(LiveEvent::ToolCall(call));
        }
        if let Some(cancel) = self.tool_call_cancellation {
            events.push(LiveEvent::ToolCallCancellation(cancel));
        }
        if let Some(content) = self.server_content {
            push_content_events(content, &mut events);
        }
        if let Some(usage) = self.usage_metadata {
            events.push(LiveEvent::UsageMetadata(usage));
        }

        events
    }
}

fn push_content_events(content: ServerContent, events: &mut Vec<LiveEvent>) {
    if let Some(t) = content.input_transcription
        && let Some(text) = t.text
    {
        events.push(LiveEvent::UserTranscript {
            text,
            finished: t.finished.unwrap_or(false),
        });
    }
    if let Some(t) = content.output_transcription
        && let Some(text) = t.text
    {
        events.push(LiveEvent::ModelTranscript {
            text,
            finished: t.finished.unwrap_or(false),
        });
    }
    if let Some(turn) = content.model_turn {
        for part in turn.parts {
            if let Some(blob) = part.inline_data {
                match BASE64_STANDARD.decode(blob.data.as_bytes()) {
                    Ok(data) if !data.is_empty() => {
                        events.push(LiveEvent::ModelAudio(Bytes::from(data)));
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping undecodable inline audio: {}", e),
                }
            }
            if let Some(text) = part.text
                && !text.is_empty()
            {
                events.push(LiveEvent::ModelText(text));
            }
        }
    }
    if content.interrupted.unwrap_or(false) {
        events.push(LiveEvent::Interrupted);
    }
    if content.generation_complete.unwrap_or(false) {
        events.push(LiveEvent::GenerationComplete);
    }
    if content.turn_complete.unwrap_or(false) {
        events.push(LiveEvent::TurnComplete(TurnCompleteInfo {
            reason: content.turn_complete_reason,
            waiting_for_input: content.waiting_for_input,
        }));
    }
}
