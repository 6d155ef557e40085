//! Per-client session state.
//!
//! A session owns the single path to one renderer client: a bounded
//! outbound frame channel drained by one writer task. Adapters receive a
//! clone of the send handle, never a reference to the session itself.

pub mod handler;
pub mod registry;

use crate::adapter::{self, BackendAdapter};
use crate::engine::{Agent, AsrEngine, TtsEngine};
use crate::error::{ControlError, Result};
use crate::frames::{BackendMode, OutboundFrame};
use crate::model::LiveModel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Outbound channel capacity per session.
pub const OUTBOUND_CAPACITY: usize = 64;

/// How long a direct-reply producer may wait on a full channel.
const EMIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Send handle for a session's outbound channel.
///
/// `emit` is the direct-reply path: it blocks up to one second and then
/// fails. `try_emit` is the best-effort path used by broadcasts and the
/// scheduler: a full or closed channel drops the frame with a warning.
#[derive(Clone)]
pub struct OutboundSender {
    session_id: Arc<str>,
    tx: mpsc::Sender<OutboundFrame>,
}

impl OutboundSender {
    fn new(session_id: &str, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            session_id: Arc::from(session_id),
            tx,
        }
    }

    /// Session this handle belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Enqueue a frame on the direct-reply path.
    pub async fn emit(&self, frame: OutboundFrame) -> Result<()> {
        match self.tx.send_timeout(frame, EMIT_TIMEOUT).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                warn!("session {} outbound full; direct emit timed out", self.session_id);
                Err(ControlError::Backpressure(format!(
                    "session {} outbound channel full",
                    self.session_id
                )))
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                warn!("session {} outbound closed; frame dropped", self.session_id);
                Err(ControlError::SessionClosed(self.session_id.to_string()))
            }
        }
    }

    /// Enqueue a frame best-effort. Returns whether the frame was accepted.
    pub fn try_emit(&self, frame: OutboundFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("session {} is slow; dropping frame", self.session_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("session {} outbound closed; dropping frame", self.session_id);
                false
            }
        }
    }
}

/// External collaborators and model shared by a session.
pub struct SessionContext {
    /// Live-model descriptor for the connected renderer.
    pub model: Arc<LiveModel>,
    /// Text-generation agent.
    pub agent: Arc<dyn Agent>,
    /// Speech synthesis engine.
    pub tts: Arc<dyn TtsEngine>,
    /// Speech recognition engine.
    pub asr: Arc<dyn AsrEngine>,
}

/// One renderer client's session.
pub struct Session {
    session_id: String,
    outbound: OutboundSender,
    context: Arc<SessionContext>,
    mode: RwLock<BackendMode>,
    adapters: Mutex<HashMap<BackendMode, Arc<dyn BackendAdapter>>>,
    mic_buffer: Mutex<Vec<f32>>,
}

impl Session {
    /// Create a session and its bounded outbound channel. The caller owns
    /// the receiver and must drain it (writer task or discard task).
    #[must_use]
    pub fn new(
        session_id: String,
        context: Arc<SessionContext>,
    ) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let outbound = OutboundSender::new(&session_id, tx);
        (
            Self {
                session_id,
                outbound,
                context,
                mode: RwLock::new(BackendMode::default()),
                adapters: Mutex::new(HashMap::new()),
                mic_buffer: Mutex::new(Vec::new()),
            },
            rx,
        )
    }

    /// Opaque session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send handle for the outbound channel.
    #[must_use]
    pub fn outbound(&self) -> &OutboundSender {
        &self.outbound
    }

    /// Shared collaborator context.
    #[must_use]
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Current backend mode.
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        *self.mode.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch the backend mode. Idempotent.
    pub fn set_mode(&self, mode: BackendMode) {
        *self.mode.write().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    /// Adapter for the current mode, created lazily and cached.
    #[must_use]
    pub fn adapter(&self) -> Arc<dyn BackendAdapter> {
        let mode = self.mode();
        let mut adapters = self.adapters.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(adapters.entry(mode).or_insert_with(|| {
            adapter::create(mode, self.outbound.clone(), Arc::clone(&self.context))
        }))
    }

    /// Append microphone samples to the current utterance.
    pub fn push_mic_audio(&self, samples: &[f32]) {
        self.mic_buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(samples);
    }

    /// Take the current utterance, leaving a fresh buffer. Samples that
    /// arrive during transcription accumulate into the next utterance.
    #[must_use]
    pub fn take_mic_audio(&self) -> Vec<f32> {
        std::mem::take(&mut *self.mic_buffer.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
