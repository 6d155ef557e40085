//! Backend adapters: the dispatch layer that normalizes command origins.
//!
//! Every variant exposes the same four operations over a session's
//! outbound channel. Adapters hold a clone of the send handle and the
//! session context; they never reference the session itself.

mod autonomous;
mod external;
mod internal;

pub use autonomous::AutonomousAdapter;
pub use external::ExternalApiAdapter;
pub use internal::InternalAdapter;

use crate::error::Result;
use crate::frames::{BackendMode, MotionSpec};
use crate::session::{OutboundSender, SessionContext};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub(crate) use internal::AdapterCore;

/// Outcome of an adapter operation, mirrored to REST callers and acks.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterResult {
    /// `success` or `error`.
    pub status: String,
    /// Failure reason when status is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operation-specific fields, flattened into the payload.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl AdapterResult {
    /// Successful result.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: "success".to_owned(),
            error: None,
            detail: serde_json::Map::new(),
        }
    }

    /// Failed result with a reason.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_owned(),
            error: Some(message.into()),
            detail: serde_json::Map::new(),
        }
    }

    /// Attach a detail field.
    #[must_use]
    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.detail.insert(key.to_owned(), value);
        self
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// A speech event to dispatch through an adapter.
#[derive(Debug, Clone, Default)]
pub struct SpeakRequest {
    /// Text to speak; may be empty for expression-only events.
    pub text: String,
    /// Expression IDs to apply.
    pub expressions: Vec<i64>,
    /// Motions to trigger after the audio frame.
    pub motions: Vec<MotionSpec>,
    /// Skip synthesis and emit a silent frame.
    pub skip_tts: bool,
    /// Caption text override; defaults to `text` with the model's name.
    pub display_text: Option<String>,
}

/// Polymorphic command surface over a session.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// The variant this adapter implements.
    fn mode(&self) -> BackendMode;

    /// Apply an expression, optionally scheduling a reset after
    /// `duration_ms` (0 = permanent).
    async fn trigger_expression(
        &self,
        expression_id: i64,
        duration_ms: u64,
        priority: i32,
    ) -> Result<AdapterResult>;

    /// Play a motion from a named group.
    async fn trigger_motion(
        &self,
        group: &str,
        index: u32,
        looped: bool,
        priority: i32,
    ) -> Result<AdapterResult>;

    /// Dispatch a speech event: at most one audio frame, then motion frames.
    async fn speak(&self, request: SpeakRequest) -> Result<AdapterResult>;

    /// Generate text via the agent, streaming chunk frames to the session
    /// and returning the full text.
    async fn generate_text(
        &self,
        prompt: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<String>;
}

/// Instantiate the adapter for a mode. Sessions call this lazily and cache
/// the result per mode.
#[must_use]
pub fn create(
    mode: BackendMode,
    outbound: OutboundSender,
    context: Arc<SessionContext>,
) -> Arc<dyn BackendAdapter> {
    match mode {
        BackendMode::Internal => Arc::new(InternalAdapter::new(outbound, context)),
        BackendMode::ExternalApi => Arc::new(ExternalApiAdapter::new(outbound, context)),
        BackendMode::Autonomous => Arc::new(AutonomousAdapter::new(outbound, context)),
    }
}
