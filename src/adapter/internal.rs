//! Internal adapter: the default variant, plus the dispatch core shared by
//! all variants.

use crate::adapter::{AdapterResult, BackendAdapter, SpeakRequest};
use crate::engine::EXTERNAL_CALL_TIMEOUT;
use crate::error::{ControlError, Result};
use crate::frames::{
    Actions, AudioFrame, BackendMode, DisplayText, MotionFrame, OutboundFrame,
};
use crate::session::{OutboundSender, SessionContext};
use async_trait::async_trait;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Shared dispatch logic. Variants differ only in emission policy and tag.
pub(crate) struct AdapterCore {
    outbound: OutboundSender,
    context: Arc<SessionContext>,
    /// Best-effort variants drop frames instead of blocking.
    best_effort: bool,
}

impl AdapterCore {
    pub(crate) fn new(
        outbound: OutboundSender,
        context: Arc<SessionContext>,
        best_effort: bool,
    ) -> Self {
        Self {
            outbound,
            context,
            best_effort,
        }
    }

    /// Emit one frame under the variant's policy.
    async fn emit(&self, frame: OutboundFrame) -> Result<()> {
        if self.best_effort {
            // Dropped frames are logged inside try_emit; best-effort paths
            // never surface backpressure to the caller.
            let _ = self.outbound.try_emit(frame);
            Ok(())
        } else {
            self.outbound.emit(frame).await
        }
    }

    pub(crate) async fn trigger_expression(
        &self,
        expression_id: i64,
        duration_ms: u64,
        priority: i32,
    ) -> Result<AdapterResult> {
        let model = &self.context.model;
        if !model.has_expression(expression_id) {
            return Ok(AdapterResult::error(format!(
                "unknown expression id {expression_id}"
            )));
        }

        let frame = expression_frame(expression_id);
        self.emit(frame).await?;

        if duration_ms > 0 {
            let outbound = self.outbound.clone();
            let default_expression = model.default_expression();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                let _ = outbound.try_emit(expression_frame(default_expression));
            });
        }

        Ok(AdapterResult::success()
            .with("expression_id", expression_id.into())
            .with("duration", duration_ms.into())
            .with("priority", priority.into()))
    }

    pub(crate) async fn trigger_motion(
        &self,
        group: &str,
        index: u32,
        looped: bool,
        priority: i32,
    ) -> Result<AdapterResult> {
        if !self.context.model.has_motion_group(group) {
            return Ok(AdapterResult::error(format!("unknown motion group {group}")));
        }

        self.emit(OutboundFrame::MotionCommand(MotionFrame {
            motion_group: group.to_owned(),
            motion_index: index,
            looped,
            priority,
        }))
        .await?;

        Ok(AdapterResult::success()
            .with("motion_group", group.into())
            .with("motion_index", index.into())
            .with("loop", looped.into())
            .with("priority", priority.into()))
    }

    pub(crate) async fn speak(&self, request: SpeakRequest) -> Result<AdapterResult> {
        let model = &self.context.model;
        for id in &request.expressions {
            if !model.has_expression(*id) {
                return Ok(AdapterResult::error(format!("unknown expression id {id}")));
            }
        }
        for motion in &request.motions {
            if !model.has_motion_group(&motion.group) {
                return Ok(AdapterResult::error(format!(
                    "unknown motion group {}",
                    motion.group
                )));
            }
        }

        let wants_tts = !request.skip_tts && !request.text.trim().is_empty();
        let mut frame = AudioFrame {
            audio: None,
            format: String::new(),
            volumes: Vec::new(),
            slice_length_ms: 0,
            display_text: None,
            actions: None,
            forwarded: false,
        };
        let mut tts_generated = false;

        if wants_tts {
            let synthesis =
                tokio::time::timeout(EXTERNAL_CALL_TIMEOUT, self.context.tts.synthesize(&request.text))
                    .await;
            match synthesis {
                Ok(Ok(audio)) => {
                    frame.audio = Some(
                        base64::engine::general_purpose::STANDARD.encode(&audio.audio),
                    );
                    frame.format = audio.format;
                    frame.volumes = audio.volumes;
                    frame.slice_length_ms = audio.slice_length_ms;
                    tts_generated = true;
                }
                Ok(Err(e)) => {
                    error!("TTS synthesis failed: {e}");
                    return Ok(AdapterResult::error(format!("TTS failed: {e}")));
                }
                Err(_) => {
                    error!("TTS synthesis timed out");
                    return Ok(AdapterResult::error("TTS timed out"));
                }
            }
        }

        let caption = request.display_text.clone().unwrap_or_else(|| request.text.clone());
        if !caption.is_empty() || tts_generated {
            frame.display_text = Some(DisplayText {
                text: caption,
                name: model.character_name().to_owned(),
                avatar: model.avatar().to_owned(),
            });
        }

        if !request.expressions.is_empty() {
            frame.actions = Some(Actions {
                expressions: request.expressions.clone(),
                motions: Vec::new(),
            });
        }

        // Audio frame first, then motions, always in request order.
        self.emit(OutboundFrame::Audio(frame)).await?;
        for motion in &request.motions {
            self.emit(OutboundFrame::MotionCommand(MotionFrame {
                motion_group: motion.group.clone(),
                motion_index: motion.index,
                looped: motion.looped,
                priority: motion.priority,
            }))
            .await?;
        }

        Ok(AdapterResult::success()
            .with("text", request.text.clone().into())
            .with(
                "expressions",
                serde_json::Value::from(request.expressions.clone()),
            )
            .with(
                "motions",
                request
                    .motions
                    .iter()
                    .map(|m| format!("{}/{}", m.group, m.index))
                    .collect::<Vec<_>>()
                    .into(),
            )
            .with("tts_generated", tts_generated.into()))
    }

    pub(crate) async fn generate_text(
        &self,
        prompt: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<String> {
        let full = tokio::time::timeout(EXTERNAL_CALL_TIMEOUT, async {
            let mut rx = self.context.agent.chat(prompt, context).await?;
            let mut full = String::new();
            while let Some(chunk) = rx.recv().await {
                full.push_str(&chunk);
                self.emit(OutboundFrame::TextGenerationChunk { text: chunk })
                    .await?;
            }
            Ok::<String, ControlError>(full)
        })
        .await
        .map_err(|_| ControlError::ExternalService("text generation timed out".to_owned()))??;

        debug!("generated {} chars for session {}", full.len(), self.outbound.session_id());
        self.emit(OutboundFrame::TextGenerationResponse { text: full.clone() })
            .await?;
        Ok(full)
    }
}

/// Expression-only audio frame (`audio: null`).
fn expression_frame(expression_id: i64) -> OutboundFrame {
    OutboundFrame::Audio(AudioFrame {
        audio: None,
        format: String::new(),
        volumes: Vec::new(),
        slice_length_ms: 0,
        display_text: None,
        actions: Some(Actions {
            expressions: vec![expression_id],
            motions: Vec::new(),
        }),
        forwarded: false,
    })
}

/// Default adapter: synthesizes locally and streams to the renderer.
pub struct InternalAdapter {
    core: AdapterCore,
}

impl InternalAdapter {
    /// Create the adapter over a session's send handle and context.
    #[must_use]
    pub fn new(outbound: OutboundSender, context: Arc<SessionContext>) -> Self {
        Self {
            core: AdapterCore::new(outbound, context, false),
        }
    }
}

#[async_trait]
impl BackendAdapter for InternalAdapter {
    fn mode(&self) -> BackendMode {
        BackendMode::Internal
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
