//! Gemini Live connection configuration.
//!
//! This module contains:
//! - Endpoint selection (Vertex AI or the Gemini Developer API)
//! - Model resource naming
//! - Voice and transcription options sent in the setup message

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use super::super::base::{RealtimeError, RealtimeResult};

/// Vertex AI Live endpoint host suffix, prefixed with the location.
pub const VERTEX_HOST_SUFFIX: &str = "aiplatform.googleapis.com";

/// Vertex AI Live WebSocket path.
pub const VERTEX_LIVE_PATH: &str =
    "/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent";

/// Gemini Developer API Live endpoint.
pub const DEVELOPER_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

pub const DEFAULT_MODEL: &str = "gemini-live-2.5-flash-native-audio";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_VOICE_NAME: &str = "Aoede";
pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 16000;

/// Native output rate of Gemini Live audio.
pub const GEMINI_LIVE_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// How long to wait for `setupComplete` after the socket opens.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Backend
// =============================================================================

/// Which Google API fronts the Live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveBackend {
    /// Vertex AI, authenticated with an OAuth bearer token
    #[default]
    Vertex,
    /// Gemini Developer API, authenticated with an API key
    Developer,
}

impl LiveBackend {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Developer => "developer",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "developer" | "gemini" | "mldev" => Self::Developer,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for LiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Everything needed to open a Gemini Live session.
#[derive(Clone)]
pub struct GeminiLiveConfig {
    pub backend: LiveBackend,
    pub project_id: Option<String>,
    pub location: String,

    /// OAuth bearer token for Vertex AI
    pub access_token: Option<Zeroizing<String>>,
    /// API key for the Developer API
    pub api_key: Option<Zeroizing<String>>,

    pub model: String,
    pub voice_name: String,
    /// Model used for input/output transcription; `None` uses the server default
    pub transcription_model: Option<String>,
    pub input_sample_rate: u32,

    pub enable_affective_dialog: bool,
    pub enable_proactive_audio: bool,
    pub system_instruction: Option<String>,

    /// Retry setup once without a transcription model if the server rejects it
    pub fallback_to_default_transcription: bool,

    /// Connect here instead of the backend's public endpoint
    pub endpoint_override: Option<String>,

    pub setup_timeout: Duration,
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self {
            backend: LiveBackend::Vertex,
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            access_token: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            input_sample_rate: DEFAULT_INPUT_SAMPLE_RATE,
            enable_affective_dialog: true,
            enable_proactive_audio: true,
            system_instruction: None,
            fallback_to_default_transcription: true,
            endpoint_override: None,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for GeminiLiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveConfig")
            .field("backend", &self.backend)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("voice_name", &self.voice_name)
            .field("transcription_model", &self.transcription_model)
            .field("input_sample_rate", &self.input_sample_rate)
            .field("endpoint_override", &self.endpoint_override)
            .finish_non_exhaustive()
    }
}

fn is_blank(secret: &Option<Zeroizing<String>>) -> bool {
    secret.as_ref().is_none_or(|s| s.trim().is_empty())
}

impl GeminiLiveConfig {
    /// Check that the backend has what it needs to authenticate.
    pub fn validate(&self) -> RealtimeResult<()> {
        if self.model.trim().is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "model must not be empty".to_string(),
            ));
        }
        if self.input_sample_rate == 0 {
            return Err(RealtimeError::InvalidConfiguration(
                "input sample rate must be greater than 0".to_string(),
            ));
        }
        if self.endpoint_override.is_some() {
            return Ok(());
        }
        match self.backend {
            LiveBackend::Vertex => {
                if self.project_id.as_deref().is_none_or(str::is_empty) {
                    return Err(RealtimeError::InvalidConfiguration(
                        "Vertex backend requires a project id".to_string(),
                    ));
                }
                if is_blank(&self.access_token) {
                    return Err(RealtimeError::AuthenticationFailed(
                        "Vertex backend requires an access token".to_string(),
                    ));
                }
            }
            LiveBackend::Developer => {
                if is_blank(&self.api_key) {
                    return Err(RealtimeError::AuthenticationFailed(
                        "Developer backend requires an API key".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fully qualified model name for the setup message.
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("projects/") || self.model.starts_with("models/") {
            return self.model.clone();
        }
        match self.backend {
            LiveBackend::Vertex => format!(
                "projects/{}/locations/{}/publishers/google/models/{}",
                self.project_id.as_deref().unwrap_or_default(),
                self.location,
                self.model
            ),
            LiveBackend::Developer => format!("models/{}", self.model),
        }
    }

    /// WebSocket URL to connect to.
    pub fn websocket_url(&self) -> RealtimeResult<Url> {
        let raw = match (&self.endpoint_override, self.backend) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, LiveBackend::Vertex) => format!(
                "wss://{}-{}{}",
                self.location, VERTEX_HOST_SUFFIX, VERTEX_LIVE_PATH
            ),
            (None, LiveBackend::Developer) => DEVELOPER_LIVE_URL.to_string(),
        };

        let mut url = Url::parse(&raw)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid endpoint {raw}: {e}")))?;

        if self.backend == LiveBackend::Developer
            && let Some(key) = self.api_key.as_ref()
        {
            url.query_pairs_mut().append_pair("key", key.as_str());
        }
        Ok(url)
    }

    /// Value of the `Authorization` header, if the backend uses one.
    pub fn authorization_header(&self) -> Option<String> {
        match self.backend {
            LiveBackend::Vertex => self
                .access_token
                .as_ref()
                .filter(|t| !t.is_empty())
                .map(|t| format!("Bearer {}", t.as_str())),
            LiveBackend::Developer => None,
        }
    }

    /// Copy of this config with the transcription model dropped.
    pub fn without_transcription_model(&self) -> Self {
        let mut config = self.clone();
        config.transcription_model = None;
        config
    }
}
