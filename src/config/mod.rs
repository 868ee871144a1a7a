//! Configuration module for the live transcript client
//!
//! This module handles configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//!
//! # Example
//! ```rust,no_run
//! use live_transcript::config::LiveSettings;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let settings = LiveSettings::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let settings = LiveSettings::from_file(&config_path)?;
//!
//! println!("Using model {}", settings.model);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

mod env;
mod yaml;

pub use env::parse_bool;
pub use yaml::YamlConfig;

use crate::audio::PCM16_BYTES_PER_SAMPLE;
use crate::core::realtime::gemini::{
    DEFAULT_INPUT_SAMPLE_RATE, DEFAULT_LOCATION, DEFAULT_MODEL, DEFAULT_TRANSCRIPTION_MODEL,
    DEFAULT_VOICE_NAME, GEMINI_LIVE_OUTPUT_SAMPLE_RATE,
};
use crate::core::realtime::{GeminiLiveConfig, LiveBackend};
use crate::core::session::EngineConfig;
use crate::core::transcript::DEFAULT_HISTORY_WINDOW;

/// Resolved settings for one live session.
///
/// Secrets are wrapped in [`Zeroizing`] and wiped when the settings drop.
#[derive(Clone)]
pub struct LiveSettings {
    pub backend: LiveBackend,
    pub project_id: Option<String>,
    pub location: String,
    pub access_token: Option<Zeroizing<String>>,
    pub api_key: Option<Zeroizing<String>>,

    pub model: String,
    /// `None` lets the server pick its default transcription model
    pub transcription_model: Option<String>,
    pub voice_name: String,
    pub system_instruction: Option<String>,

    pub input_sample_rate_hz: u32,
    pub output_sample_rate_hz: u32,

    pub enable_proactive_audio: bool,
    pub enable_affective_dialog: bool,
    pub fallback_to_default_transcription: bool,
    /// Log every transport event at debug level
    pub debug_events: bool,

    pub history_window: usize,
    pub playback_lead_ms: u64,
    pub sync_interval_ms: u64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            backend: LiveBackend::default(),
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            access_token: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            system_instruction: None,
            input_sample_rate_hz: DEFAULT_INPUT_SAMPLE_RATE,
            output_sample_rate_hz: GEMINI_LIVE_OUTPUT_SAMPLE_RATE,
            enable_proactive_audio: true,
            enable_affective_dialog: true,
            fallback_to_default_transcription: true,
            debug_events: false,
            history_window: DEFAULT_HISTORY_WINDOW,
            playback_lead_ms: 100,
            sync_interval_ms: 30,
        }
    }
}

impl std::fmt::Debug for LiveSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSettings")
            .field("backend", &self.backend)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("transcription_model", &self.transcription_model)
            .field("voice_name", &self.voice_name)
            .field("input_sample_rate_hz", &self.input_sample_rate_hz)
            .field("output_sample_rate_hz", &self.output_sample_rate_hz)
            .field("history_window", &self.history_window)
            .field("playback_lead_ms", &self.playback_lead_ms)
            .field("sync_interval_ms", &self.sync_interval_ms)
            .finish_non_exhaustive()
    }
}

impl LiveSettings {
    /// Load settings from environment variables and validate them.
    ///
    /// The .env file is loaded in main.rs at application startup, so its
    /// values are already part of the environment here.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let settings = env::load_from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file with environment variables as the base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed, an
    /// environment variable has an invalid format, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let settings = Self::load(Some(path))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Merge the environment and an optional YAML file without validating,
    /// for callers that apply further overrides (command-line flags) first.
    pub fn load(path: Option<&PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = env::load_from_env()?;
        if let Some(path) = path {
            settings.merge_yaml(YamlConfig::from_file(path)?);
        }
        Ok(settings)
    }

    /// Apply every value present in `yaml` over the current settings.
    pub fn merge_yaml(&mut self, yaml: YamlConfig) {
        if let Some(backend) = yaml.backend {
            self.backend = LiveBackend::from_str_or_default(&backend);
        }
        if let Some(vertex) = yaml.vertex {
            if vertex.project_id.is_some() {
                self.project_id = vertex.project_id;
            }
            if let Some(location) = vertex.location {
                self.location = location;
            }
            if let Some(token) = vertex.access_token {
                self.access_token = Some(Zeroizing::new(token));
            }
        }
        if let Some(key) = yaml.developer.and_then(|d| d.api_key) {
            self.api_key = Some(Zeroizing::new(key));
        }
        if let Some(model) = yaml.model {
            if let Some(name) = model.name {
                self.model = name;
            }
            if let Some(transcription) = model.transcription_model {
                self.transcription_model = Some(transcription).filter(|m| !m.trim().is_empty());
            }
            if let Some(voice) = model.voice_name {
                self.voice_name = voice;
            }
            if model.system_instruction.is_some() {
                self.system_instruction = model.system_instruction;
            }
            if let Some(flag) = model.enable_proactive_audio {
                self.enable_proactive_audio = flag;
            }
            if let Some(flag) = model.enable_affective_dialog {
                self.enable_affective_dialog = flag;
            }
            if let Some(flag) = model.fallback_to_default_transcription {
                self.fallback_to_default_transcription = flag;
            }
        }
        if let Some(audio) = yaml.audio {
            if let Some(rate) = audio.input_sample_rate_hz {
                self.input_sample_rate_hz = rate;
            }
            if let Some(rate) = audio.output_sample_rate_hz {
                self.output_sample_rate_hz = rate;
            }
        }
        if let Some(engine) = yaml.engine {
            if let Some(window) = engine.history_window {
                self.history_window = window;
            }
            if let Some(lead) = engine.playback_lead_ms {
                self.playback_lead_ms = lead;
            }
            if let Some(interval) = engine.sync_interval_ms {
                self.sync_interval_ms = interval;
            }
        }
        if let Some(flag) = yaml.logging.and_then(|l| l.debug_events) {
            self.debug_events = flag;
        }
    }

    /// Check value ranges and backend credentials.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.input_sample_rate_hz == 0 {
            return Err("input_sample_rate_hz must be greater than 0".into());
        }
        if self.output_sample_rate_hz == 0 {
            return Err("output_sample_rate_hz must be greater than 0".into());
        }
        if self.history_window == 0 {
            return Err("history_window must be at least 1".into());
        }
        if self.sync_interval_ms == 0 {
            return Err("sync_interval_ms must be at least 1".into());
        }
        match self.backend {
            LiveBackend::Vertex => {
                if self.project_id.as_deref().is_none_or(str::is_empty) {
                    return Err(
                        "Vertex backend requires a project id: set GEMINI_LIVE_PROJECT_ID, GOOGLE_CLOUD_PROJECT or GOOGLE_APPLICATION_CREDENTIALS"
                            .into(),
                    );
                }
                if self.access_token.as_ref().is_none_or(|t| t.is_empty()) {
                    return Err("Vertex backend requires GEMINI_LIVE_ACCESS_TOKEN".into());
                }
            }
            LiveBackend::Developer => {
                if self.api_key.as_ref().is_none_or(|k| k.is_empty()) {
                    return Err("Developer backend requires GEMINI_API_KEY or GOOGLE_API_KEY".into());
                }
            }
        }
        Ok(())
    }

    /// Engine tunables derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            history_window: self.history_window,
            playback_lead: Duration::from_millis(self.playback_lead_ms),
            sync_interval: Duration::from_millis(self.sync_interval_ms),
            output_sample_rate: self.output_sample_rate_hz,
            bytes_per_sample: PCM16_BYTES_PER_SAMPLE,
        }
    }

    /// Connection config for the Gemini Live client.
    pub fn gemini_config(&self) -> GeminiLiveConfig {
        GeminiLiveConfig {
            backend: self.backend,
            project_id: self.project_id.clone(),
            location: self.location.clone(),
            access_token: self.access_token.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            voice_name: self.voice_name.clone(),
            transcription_model: self.transcription_model.clone(),
            input_sample_rate: self.input_sample_rate_hz,
            enable_affective_dialog: self.enable_affective_dialog,
            enable_proactive_audio: self.enable_proactive_audio,
            system_instruction: self.system_instruction.clone(),
            fallback_to_default_transcription: self.fallback_to_default_transcription,
            ..Default::default()
        }
    }
}
