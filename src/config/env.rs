//! Environment variable loading.

use std::env;
use std::str::FromStr;

use zeroize::Zeroizing;

use super::LiveSettings;
use crate::core::realtime::LiveBackend;

/// Parse a boolean flag: `1`, `true`, `yes` and `on` are true.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    var(name).filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid {name} value {raw:?}: {e}").into()),
        None => Ok(None),
    }
}

/// `project_id` from the service account file named by
/// `GOOGLE_APPLICATION_CREDENTIALS`, if any.
pub(super) fn project_from_credentials_file() -> Option<String> {
    let path = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS")?;
    let contents = std::fs::read_to_string(&path).ok()?;
    let json: serde_json::Value = serde_json::from_str(&contents).ok()?;
    json.get("project_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn resolve_project_id() -> Option<String> {
    non_empty_var("GEMINI_LIVE_PROJECT_ID")
        .or_else(project_from_credentials_file)
        .or_else(|| non_empty_var("GOOGLE_CLOUD_PROJECT"))
}

/// Build settings from environment variables on top of the defaults.
pub(super) fn load_from_env() -> Result<LiveSettings, Box<dyn std::error::Error>> {
    let mut settings = LiveSettings::default();

    if let Some(backend) = non_empty_var("GEMINI_LIVE_BACKEND") {
        settings.backend = LiveBackend::from_str_or_default(&backend);
    }
    settings.project_id = resolve_project_id();
    if let Some(location) = non_empty_var("GEMINI_LIVE_LOCATION") {
        settings.location = location;
    }
    settings.access_token = non_empty_var("GEMINI_LIVE_ACCESS_TOKEN").map(Zeroizing::new);
    settings.api_key = non_empty_var("GEMINI_API_KEY")
        .or_else(|| non_empty_var("GOOGLE_API_KEY"))
        .map(Zeroizing::new);

    if let Some(model) = non_empty_var("GEMINI_LIVE_MODEL") {
        settings.model = model;
    }
    // Set-but-empty selects the server default.
    if let Some(model) = var("GEMINI_LIVE_TRANSCRIPTION_MODEL") {
        settings.transcription_model = Some(model).filter(|m| !m.is_empty());
    }
    if let Some(voice) = non_empty_var("GEMINI_LIVE_VOICE_NAME") {
        settings.voice_name = voice;
    }
    settings.system_instruction = non_empty_var("GEMINI_LIVE_SYSTEM_INSTRUCTION");

    if let Some(rate) = parse_var("GEMINI_LIVE_INPUT_SAMPLE_RATE_HZ")? {
        settings.input_sample_rate_hz = rate;
    }
    if let Some(rate) = parse_var("GEMINI_LIVE_OUTPUT_SAMPLE_RATE_HZ")? {
        settings.output_sample_rate_hz = rate;
    }

    if let Some(flag) = non_empty_var("GEMINI_LIVE_PROACTIVE_AUDIO") {
        settings.enable_proactive_audio = parse_bool(&flag);
    }
    if let Some(flag) = non_empty_var("GEMINI_LIVE_AFFECTIVE_DIALOG") {
        settings.enable_affective_dialog = parse_bool(&flag);
    }
    if let Some(flag) = non_empty_var("GEMINI_LIVE_DEBUG_EVENTS") {
        settings.debug_events = parse_bool(&flag);
    }
    if let Some(flag) = non_empty_var("GEMINI_LIVE_FALLBACK_TO_DEFAULT_TRANSCRIPTION") {
        settings.fallback_to_default_transcription = parse_bool(&flag);
    }

    if let Some(window) = parse_var("GEMINI_LIVE_HISTORY_WINDOW")? {
        settings.history_window = window;
    }
    if let Some(lead) = parse_var("GEMINI_LIVE_PLAYBACK_LEAD_MS")? {
        settings.playback_lead_ms = lead;
    }
    if let Some(interval) = parse_var("GEMINI_LIVE_SYNC_INTERVAL_MS")? {
        settings.sync_interval_ms = interval;
    }

    Ok(settings)
}
