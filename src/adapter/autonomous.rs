//! Autonomous adapter: the variant the scheduler speaks through.
//!
//! Identical surface, best-effort emission: scheduler and broadcast paths
//! must never block on a slow renderer, so a full channel drops the frame
//! with a warning instead of waiting.

use crate::adapter::{AdapterCore, AdapterResult, BackendAdapter, SpeakRequest};
use crate::error::Result;
use crate::frames::BackendMode;
use crate::session::{OutboundSender, SessionContext};
use async_trait::async_trait;
use std::sync::Arc;

/// Adapter for sessions in autonomous mode.
pub struct AutonomousAdapter {
    core: AdapterCore,
}

impl AutonomousAdapter {
    /// Create the adapter over a session's send handle and context.
    #[must_use]
    pub fn new(outbound: OutboundSender, context: Arc<SessionContext>) -> Self {
        Self {
            core: AdapterCore::new(outbound, context, true),
        }
    }
}

#[async_trait]
impl BackendAdapter for AutonomousAdapter {
    fn mode(&self) -> BackendMode {
        BackendMode::Autonomous
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

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::CharacterConfig;
    use crate::model::LiveModel;
    use crate::session::{Session, OUTBOUND_CAPACITY};
    use crate::test_utils::{ScriptedAgent, ScriptedAsr, ScriptedTts};

    #[tokio::test]
    async fn full_channel_drops_instead_of_failing() {
        let context = Arc::new(SessionContext {
            model: Arc::new(LiveModel::from_config(&CharacterConfig::default())),
            agent: Arc::new(ScriptedAgent::new(Vec::new())),
            tts: Arc::new(ScriptedTts::new()),
            asr: Arc::new(ScriptedAsr::new("")),
        });
        let (session, _rx) = Session::new("slow".to_owned(), Arc::clone(&context));
        for _ in 0..OUTBOUND_CAPACITY {
            assert!(session.outbound().try_emit(crate::frames::OutboundFrame::FullText {
                text: "fill".to_owned(),
            }));
        }

        let adapter = AutonomousAdapter::new(session.outbound().clone(), context);
        let result = adapter
            .speak(SpeakRequest {
                text: String::new(),
                expressions: vec![0],
                motions: Vec::new(),
                skip_tts: true,
                display_text: None,
            })
            .await
            .expect("speak");
        // The frame was dropped, but the best-effort path still reports
        // success to the scheduler.
        assert!(result.is_success());
    }
}
