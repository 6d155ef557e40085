//! External-API adapter: pre-generated content pushed by outside services.
//!
//! Same surface as the internal variant; `speak` accepts text produced
//! elsewhere and honors `skip_tts`, so callers decide whether synthesis
//! runs at all.

use crate::adapter::{AdapterCore, AdapterResult, BackendAdapter, SpeakRequest};
use crate::error::Result;
use crate::frames::BackendMode;
use crate::session::{OutboundSender, SessionContext};
use async_trait::async_trait;
use std::sync::Arc;

/// Adapter for sessions driven by external APIs.
pub struct ExternalApiAdapter {
    core: AdapterCore,
}

impl ExternalApiAdapter {
    /// Create the adapter over a session's send handle and context.
    #[must_use]
    pub fn new(outbound: OutboundSender, context: Arc<SessionContext>) -> Self {
        Self {
            core: AdapterCore::new(outbound, context, false),
        }
    }
}

#[async_trait]
impl BackendAdapter for ExternalApiAdapter {
    fn mode(&self) -> BackendMode {
        BackendMode::ExternalApi
    }

    async fn trigger_expression(
        &self,
        expression_id: i64,
        duration_ms: u64,
        priority: i32,
    ) -> Result<AdapterResult> {
        self.core
            .trigger_expression(expression_id, duration_ms, priority)
            .await
    }

    async fn trigger_motion(
        &self,
        group: &str,
        index: u32,
        looped: bool,
        priority: i32,
    ) -> Result<AdapterResult> {
        self.core.trigger_motion(group, index, looped, priority).await
    }

    async fn speak(&self, request: SpeakRequest) -> Result<AdapterResult> {
        self.core.speak(request).await
    }

    async fn generate_text(
        &self,
        prompt: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<String> {
        self.core.generate_text(prompt, context).await
    }
}
