use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// backend: "vertex"
///
/// vertex:
///   project_id: "my-project"
///   location: "us-central1"
///   access_token: "ya29...."
///
/// developer:
///   api_key: "your-gemini-api-key"
///
/// model:
///   name: "gemini-live-2.5-flash-native-audio"
///   transcription_model: "whisper-large-v3"
///   voice_name: "Aoede"
///   system_instruction: "You are a friendly storyteller."
///   enable_proactive_audio: true
///   enable_affective_dialog: true
///   fallback_to_default_transcription: true
///
/// audio:
///   input_sample_rate_hz: 16000
///   output_sample_rate_hz: 24000
///
/// engine:
///   history_window: 4
///   playback_lead_ms: 100
///   sync_interval_ms: 30
///
/// logging:
///   debug_events: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub backend: Option<String>,
    pub vertex: Option<VertexYaml>,
    pub developer: Option<DeveloperYaml>,
    pub model: Option<ModelYaml>,
    pub audio: Option<AudioYaml>,
    pub engine: Option<EngineYaml>,
    pub logging: Option<LoggingYaml>,
}

/// Vertex AI connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VertexYaml {
    pub project_id: Option<String>,
    pub location: Option<String>,
    /// OAuth bearer token (e.g. from `gcloud auth print-access-token`)
    pub access_token: Option<String>,
}

/// Gemini Developer API settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DeveloperYaml {
    pub api_key: Option<String>,
}

/// Model and voice settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelYaml {
    pub name: Option<String>,
    /// Empty string selects the server's default transcription
    pub transcription_model: Option<String>,
    pub voice_name: Option<String>,
    pub system_instruction: Option<String>,
    pub enable_proactive_audio: Option<bool>,
    pub enable_affective_dialog: Option<bool>,
    pub fallback_to_default_transcription: Option<bool>,
}

/// Audio format settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub input_sample_rate_hz: Option<u32>,
    pub output_sample_rate_hz: Option<u32>,
}

/// Interruption and sync engine settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineYaml {
    pub history_window: Option<usize>,
    pub playback_lead_ms: Option<u64>,
    pub sync_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYaml {
    pub debug_events: Option<bool>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
backend: "developer"

vertex:
  project_id: "demo-project"
  location: "europe-west4"
  access_token: "ya29.token"

developer:
  api_key: "gm-key"

model:
  name: "gemini-live-custom"
  transcription_model: ""
  voice_name: "Puck"
  enable_proactive_audio: false

audio:
  input_sample_rate_hz: 8000

engine:
  history_window: 6
  playback_lead_ms: 150

logging:
  debug_events: true
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.backend.as_deref(), Some("developer"));
        let vertex = config.vertex.as_ref().unwrap();
        assert_eq!(vertex.project_id, Some("demo-project".to_string()));
        assert_eq!(vertex.location, Some("europe-west4".to_string()));
        assert_eq!(
            config.developer.as_ref().unwrap().api_key,
            Some("gm-key".to_string())
        );
        let model = config.model.as_ref().unwrap();
        assert_eq!(model.name, Some("gemini-live-custom".to_string()));
        assert_eq!(model.transcription_model, Some(String::new()));
        assert_eq!(model.enable_proactive_audio, Some(false));
        assert_eq!(model.enable_affective_dialog, None);
        assert_eq!(config.audio.as_ref().unwrap().input_sample_rate_hz, Some(8000));
        assert_eq!(config.audio.as_ref().unwrap().output_sample_rate_hz, None);
        let engine = config.engine.as_ref().unwrap();
        assert_eq!(engine.history_window, Some(6));
        assert_eq!(engine.playback_lead_ms, Some(150));
        assert_eq!(engine.sync_interval_ms, None);
        assert_eq!(config.logging.as_ref().unwrap().debug_events, Some(true));
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.backend.is_none());
        assert!(config.vertex.is_none());
        assert!(config.engine.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "engine:\n  sync_interval_ms: 20\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.engine.unwrap().sync_interval_ms, Some(20));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "engine: [unclosed").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML config")
        );
    }
}
