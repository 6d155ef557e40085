//! Configuration types for the control plane.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration for the control-plane server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// HTTP/WebSocket server settings.
    pub server: ServerConfig,
    /// Active character and live-model descriptor.
    pub character: CharacterConfig,
    /// Autonomous speech generator settings.
    pub autonomous: AutonomousConfig,
    /// Chat ingest settings.
    pub chat: ChatConfig,
    /// Agent (LLM) service connection.
    pub agent: AgentConfig,
    /// Speech service (TTS + ASR) connection.
    pub speech: SpeechServiceConfig,
}

/// Server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 12393,
        }
    }
}

/// Character and live-model configuration.
///
/// The emotion map keys are lowercased at load time; expression IDs are the
/// renderer's preset indices. Motion groups map a group name to the ordered
/// motion indices available in that group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Display name of the character.
    pub name: String,
    /// Avatar image reference sent with display text.
    pub avatar: String,
    /// Stable character identifier.
    pub character_id: String,
    /// Emotion token → expression ID.
    pub emotion_map: HashMap<String, i64>,
    /// Motion group name → motion indices.
    pub motion_groups: HashMap<String, Vec<u32>>,
    /// Expression restored after a timed expression elapses.
    pub default_expression: i64,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        let mut emotion_map = HashMap::new();
        emotion_map.insert("neutral".to_owned(), 0);
        emotion_map.insert("sadness".to_owned(), 1);
        emotion_map.insert("anger".to_owned(), 2);
        emotion_map.insert("joy".to_owned(), 3);
        emotion_map.insert("surprise".to_owned(), 4);
        emotion_map.insert("fear".to_owned(), 5);
        emotion_map.insert("disgust".to_owned(), 6);

        let mut motion_groups = HashMap::new();
        motion_groups.insert("idle".to_owned(), vec![0, 1, 2]);
        motion_groups.insert("tap_body".to_owned(), vec![0, 1]);

        Self {
            name: "Stagehand".to_owned(),
            avatar: String::new(),
            character_id: "default".to_owned(),
            emotion_map,
            motion_groups,
            default_expression: 0,
        }
    }
}

/// Autonomous speech generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomousConfig {
    /// Whether the generator starts enabled.
    pub enabled: bool,
    /// Minimum seconds between speech events.
    pub min_interval_seconds: f64,
    /// Maximum seconds between speech events.
    pub max_interval_seconds: f64,
    /// Prompt pool sampled for each speech event.
    pub prompts: Vec<String>,
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval_seconds: 120.0,
            max_interval_seconds: 240.0,
            prompts: vec![
                "Say something interesting about yourself".to_owned(),
                "Share a random thought".to_owned(),
                "What's on your mind?".to_owned(),
                "Tell me something fun".to_owned(),
                "What would you like to talk about?".to_owned(),
                "Share a random observation".to_owned(),
                "What's happening?".to_owned(),
                "Say something spontaneous".to_owned(),
                "What are you thinking about?".to_owned(),
                "Share something random".to_owned(),
            ],
        }
    }
}

/// Chat ingest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Session the ingest pipeline speaks through.
    pub presenter_session: String,
    /// Bound of the inbound chat message queue.
    pub inbound_queue_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            presenter_session: "default".to_owned(),
            inbound_queue_size: 128,
        }
    }
}

/// Agent (LLM) service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of an OpenAI-compatible API, including `/v1`.
    pub api_url: String,
    /// Bearer token; empty disables the Authorization header.
    pub api_key: String,
    /// Model name to request.
    pub model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            // Ollama default endpoint.
            api_url: "http://localhost:11434/v1".to_owned(),
            api_key: String::new(),
            model: "smollm3:3b".to_owned(),
            max_tokens: 256,
        }
    }
}

/// Speech side-car service (TTS + ASR) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechServiceConfig {
    /// Base URL of the speech service.
    pub base_url: String,
    /// Whether TTS synthesis is attempted at all.
    pub tts_enabled: bool,
}

impl Default for SpeechServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            tts_enabled: true,
        }
    }
}

impl ControlConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ControlError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = ControlConfig::default();
        assert!(!config.autonomous.enabled);
        assert!(
            config.autonomous.min_interval_seconds <= config.autonomous.max_interval_seconds
        );
        assert!(!config.autonomous.prompts.is_empty());
        assert_eq!(config.chat.presenter_session, "default");
        assert_eq!(config.character.emotion_map.get("joy"), Some(&3));
    }

    #[test]
    fn from_file_accepts_partial_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stagehand.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[character]\nname = \"Mira\"\n",
        )
        .expect("write config");

        let config = ControlConfig::from_file(&path).expect("parse config");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.character.name, "Mira");
        // Unlisted sections fall back wholesale.
        assert_eq!(config.chat.inbound_queue_size, 128);
    }

    #[test]
    fn from_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "server = [not toml").expect("write config");

        assert!(ControlConfig::from_file(&path).is_err());
    }
}
