//! External collaborator interfaces.
//!
//! The control plane consumes the agent (LLM), TTS and ASR engines purely
//! through these traits; the concrete services live elsewhere. `http`
//! provides thin clients for an OpenAI-compatible agent endpoint and a
//! speech side-car service.

pub mod http;

use crate::error::{ControlError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout applied to a single agent or TTS call.
pub const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream of text chunks produced by the agent.
pub type ChunkStream = mpsc::Receiver<String>;

/// Text-generation agent contract.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Start generating a response to `prompt`, returning a stream of text
    /// chunks. The stream ends when generation completes.
    async fn chat(
        &self,
        prompt: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<ChunkStream>;
}

/// Synthesized speech returned by the TTS engine.
#[derive(Debug, Clone)]
pub struct TtsAudio {
    /// Encoded audio bytes.
    pub audio: Vec<u8>,
    /// Container format (e.g. `wav`).
    pub format: String,
    /// Lip-sync volume samples.
    pub volumes: Vec<f32>,
    /// Duration of each volume slice in milliseconds.
    pub slice_length_ms: u64,
}

/// Text-to-speech contract.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Synthesize `text` into audio with lip-sync volumes.
    async fn synthesize(&self, text: &str) -> Result<TtsAudio>;
}

/// Speech-recognition contract.
#[async_trait]
pub trait AsrEngine: Send + Sync {
    /// Transcribe f32 PCM samples into text.
    async fn transcribe(&self, samples: &[f32]) -> Result<String>;
}

/// Run one agent call to completion and collect the chunks into a string.
///
/// Applies [`EXTERNAL_CALL_TIMEOUT`] to the whole call, covering both the
/// request and the chunk drain.
pub async fn collect_chat(
    agent: &dyn Agent,
    prompt: &str,
    context: Option<&serde_json::Value>,
) -> Result<String> {
    let collected = tokio::time::timeout(EXTERNAL_CALL_TIMEOUT, async {
        let mut rx = agent.chat(prompt, context).await?;
        let mut out = String::new();
        while let Some(chunk) = rx.recv().await {
            out.push_str(&chunk);
        }
        Ok::<String, ControlError>(out)
    })
    .await
    .map_err(|_| ControlError::ExternalService("agent call timed out".to_owned()))??;

    Ok(collected.trim().to_owned())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::test_utils::ScriptedAgent;

    #[tokio::test]
    async fn collect_chat_joins_chunks() {
        let agent = ScriptedAgent::new(vec!["Hello ".to_owned(), "world".to_owned()]);
        let text = collect_chat(&agent, "hi", None).await.expect("chat");
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn collect_chat_propagates_failure() {
        let agent = ScriptedAgent::failing("backend down");
        let result = collect_chat(&agent, "hi", None).await;
        assert!(matches!(result, Err(ControlError::ExternalService(_))));
    }
}
