//! Shared test utilities: scripted collaborator engines.
//!
//! Used by unit tests across modules and by the integration tests, so the
//! module is compiled unconditionally but only reached from test code.

use crate::engine::{Agent, AsrEngine, ChunkStream, TtsAudio, TtsEngine};
use crate::error::{ControlError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Agent stub with scripted output.
#[derive(Default)]
pub struct ScriptedAgent {
    /// Chunks streamed by every call when no queued responses are set.
    chunks: Vec<String>,
    /// Per-call responses; each call pops the front entry.
    queued: Mutex<VecDeque<std::result::Result<String, String>>>,
    /// Error returned by every call, when set.
    fail: Option<String>,
    /// Number of `chat` calls made.
    pub calls: AtomicUsize,
    /// Prompts seen, in order.
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    /// Every call streams the same chunk sequence.
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }

    /// Each call pops one full response from the queue; an exhausted queue
    /// yields empty streams.
    pub fn queued(responses: Vec<&str>) -> Self {
        Self {
            queued: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| Ok(r.to_owned()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Each call pops one scripted outcome; `Err` entries fail that call.
    pub fn queued_outcomes(outcomes: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            queued: Mutex::new(
                outcomes
                    .into_iter()
                    .map(|o| o.map(str::to_owned).map_err(str::to_owned))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Every call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_owned()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn chat(
        &self,
        prompt: &str,
        _context: Option<&serde_json::Value>,
    ) -> Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_owned());

        if let Some(message) = &self.fail {
            return Err(ControlError::ExternalService(message.clone()));
        }

        let queued = self.queued.lock().expect("queue lock").pop_front();
        let chunks = match queued {
            Some(Ok(response)) => vec![response],
            Some(Err(message)) => return Err(ControlError::ExternalService(message)),
            None => self.chunks.clone(),
        };

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// TTS stub returning fixed audio, with call counting.
#[derive(Default)]
pub struct ScriptedTts {
    fail: Option<String>,
    /// Number of `synthesize` calls made.
    pub calls: AtomicUsize,
}

impl ScriptedTts {
    /// Successful stub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_owned()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TtsEngine for ScriptedTts {
    async fn synthesize(&self, _text: &str) -> Result<TtsAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail {
            return Err(ControlError::ExternalService(message.clone()));
        }
        Ok(TtsAudio {
            audio: vec![0x52, 0x49, 0x46, 0x46],
            format: "wav".to_owned(),
            volumes: vec![0.2, 0.6, 0.4],
            slice_length_ms: 20,
        })
    }
}

/// ASR stub returning fixed text.
#[derive(Default)]
pub struct ScriptedAsr {
    text: String,
    /// Number of `transcribe` calls made.
    pub calls: AtomicUsize,
}

impl ScriptedAsr {
    /// Stub transcribing every utterance to `text`.
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AsrEngine for ScriptedAsr {
    async fn transcribe(&self, _samples: &[f32]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}
