//! Gemini Live API transport.
//!
//! # Features
//!
//! - Bidirectional audio streaming over one WebSocket
//! - Input and output audio transcription
//! - Server-side voice activity detection with barge-in
//! - Vertex AI (bearer token) and Developer API (API key) endpoints
//! - Setup retry with the default transcriber when a transcription model is
//!   rejected
//!
//! # Audio Format
//!
//! Input is PCM 16-bit mono at the configured rate (16kHz by default).
//! Output is PCM 16-bit mono at 24kHz.

mod client;
mod config;
mod messages;

pub use client::{GeminiLiveClient, is_transcription_model_rejection};
pub use config::{
    DEFAULT_INPUT_SAMPLE_RATE, DEFAULT_LOCATION, DEFAULT_MODEL, DEFAULT_SETUP_TIMEOUT,
    DEFAULT_TRANSCRIPTION_MODEL, DEFAULT_VOICE_NAME, DEVELOPER_LIVE_URL,
    GEMINI_LIVE_OUTPUT_SAMPLE_RATE, GeminiLiveConfig, LiveBackend,
};
pub use messages::{ClientMessage, ServerMessage};
