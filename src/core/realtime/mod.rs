//! Live bidirectional speech transports.
//!
//! The session engine drives a [`LiveTransport`]: it streams captured audio
//! out, sends complete text turns for resume injection, and consumes typed
//! [`LiveEvent`]s. [`GeminiLiveClient`] is the production implementation.

mod base;
pub mod gemini;

pub use base::{
    ConnectionState, LiveEvent, LiveTransport, RealtimeError, RealtimeResult, ResumptionUpdate,
    TurnCompleteInfo,
};
pub use gemini::{GeminiLiveClient, GeminiLiveConfig, LiveBackend};
