//! HTTP clients for the external agent and speech services.
//!
//! The agent client speaks the OpenAI chat-completions wire format against
//! any compatible server. The speech client talks to the side-car service
//! exposing `/tts/synthesize` and `/asr/transcribe`.

use crate::config::{AgentConfig, SpeechServiceConfig};
use crate::engine::{Agent, AsrEngine, ChunkStream, TtsAudio, TtsEngine};
use crate::error::{ControlError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Agent client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpAgent {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl HttpAgent {
    /// Create a client from agent configuration.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn build_body(&self, prompt: &str, context: Option<&serde_json::Value>) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(context) = context {
            messages.push(serde_json::json!({
                "role": "system",
                "content": format!("Conversation context: {context}"),
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": prompt,
        }));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn chat(
        &self,
        prompt: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<ChunkStream> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self
            .client
            .post(&url)
            .json(&self.build_body(prompt, context));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ControlError::ExternalService(format!("agent request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ControlError::ExternalService(format!(
                "agent returned HTTP {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel::<String>(64);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("agent stream read failed: {e}");
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // SSE events are newline-delimited `data: {...}` lines.
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_owned();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                        if !content.is_empty() && tx.send(content.to_owned()).await.is_err() {
                            return;
                        }
                    }
                    if event["choices"][0]["finish_reason"].as_str() == Some("stop") {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Client for the speech side-car service (TTS + ASR).
pub struct SpeechServiceClient {
    client: reqwest::Client,
    base_url: String,
    tts_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(default)]
    audio: String,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    volumes: Vec<f32>,
    #[serde(default = "default_slice_length")]
    slice_length_ms: u64,
    #[serde(default)]
    error: Option<String>,
}

fn default_format() -> String {
    "wav".to_owned()
}

fn default_slice_length() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
struct AsrResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

impl SpeechServiceClient {
    /// Create a client from speech service configuration.
    #[must_use]
    pub fn new(config: &SpeechServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            tts_enabled: config.tts_enabled,
        }
    }

    /// Best-effort health probe of the speech service.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TtsEngine for SpeechServiceClient {
    async fn synthesize(&self, text: &str) -> Result<TtsAudio> {
        if !self.tts_enabled {
            return Err(ControlError::ExternalService(
                "TTS is disabled in configuration".to_owned(),
            ));
        }

        let url = format!("{}/tts/synthesize", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| ControlError::ExternalService(format!("TTS request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ControlError::ExternalService(format!(
                "TTS returned HTTP {}",
                response.status()
            )));
        }

        let body: TtsResponse = response
            .json()
            .await
            .map_err(|e| ControlError::ExternalService(format!("bad TTS response: {e}")))?;
        if let Some(error) = body.error {
            return Err(ControlError::ExternalService(format!("TTS failed: {error}")));
        }

        let audio = base64::engine::general_purpose::STANDARD
            .decode(body.audio.as_bytes())
            .map_err(|e| ControlError::ExternalService(format!("bad TTS audio encoding: {e}")))?;

        Ok(TtsAudio {
            audio,
            format: body.format,
            volumes: body.volumes,
            slice_length_ms: body.slice_length_ms,
        })
    }
}

#[async_trait]
impl AsrEngine for SpeechServiceClient {
    async fn transcribe(&self, samples: &[f32]) -> Result<String> {
        let url = format!("{}/asr/transcribe", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "audio_data": samples }))
            .send()
            .await
            .map_err(|e| ControlError::ExternalService(format!("ASR request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ControlError::ExternalService(format!(
                "ASR returned HTTP {}",
                response.status()
            )));
        }

        let body: AsrResponse = response
            .json()
            .await
            .map_err(|e| ControlError::ExternalService(format!("bad ASR response: {e}")))?;
        if let Some(error) = body.error {
            return Err(ControlError::ExternalService(format!("ASR failed: {error}")));
        }

        Ok(body.text)
    }
}
