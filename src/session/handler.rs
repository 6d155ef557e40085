//! Inbound frame dispatch for streaming clients.
//!
//! One handler call per received frame. Parse errors and unknown types
//! produce an `error` frame on the session and never tear down the stream.

use crate::adapter::SpeakRequest;
use crate::emotion::{extract_emotions, strip_emotion_tags};
use crate::error::Result;
use crate::frames::{AckFrame, InboundFrame, OutboundFrame};
use crate::session::Session;
use std::sync::Arc;
use tracing::{debug, warn};

/// Parse and dispatch one raw inbound message.
pub async fn dispatch_raw(session: &Arc<Session>, raw: &str) {
    let frame = match serde_json::from_str::<InboundFrame>(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("unparseable inbound frame on {}: {e}", session.session_id());
            let _ = session
                .outbound()
                .emit(OutboundFrame::Error {
                    message: format!("unrecognized message: {e}"),
                })
                .await;
            return;
        }
    };
    dispatch(session, frame).await;
}

/// Dispatch one parsed inbound frame.
pub async fn dispatch(session: &Arc<Session>, frame: InboundFrame) {
    let result = match frame {
        InboundFrame::ExpressionCommand {
            expression_id,
            duration,
            priority,
        } => handle_expression(session, expression_id, duration, priority).await,
        InboundFrame::MotionCommand {
            motion_group,
            motion_index,
            looped,
            priority,
        } => handle_motion(session, &motion_group, motion_index, looped, priority).await,
        InboundFrame::TextInput { text } => handle_text_input(session, &text).await,
        InboundFrame::TextGenerationRequest { prompt, context } => {
            handle_text_generation(session, &prompt, context.as_ref()).await
        }
        InboundFrame::SetBackendMode { mode } => {
            session.set_mode(mode);
            session
                .outbound()
                .emit(OutboundFrame::BackendModeSet { mode })
                .await
        }
        InboundFrame::GetBackendMode => {
            session
                .outbound()
                .emit(OutboundFrame::BackendModeSet {
                    mode: session.mode(),
                })
                .await
        }
        InboundFrame::MicAudioData { audio } => {
            session.push_mic_audio(&audio);
            Ok(())
        }
        InboundFrame::MicAudioEnd => handle_mic_end(session).await,
    };

    if let Err(e) = result {
        warn!("handler error on session {}: {e}", session.session_id());
    }
}

/// Ack first, payload second; the ack reflects model validation and the
/// adapter revalidates against the same immutable model.
async fn handle_expression(
    session: &Arc<Session>,
    expression_id: i64,
    duration: u64,
    priority: i32,
) -> Result<()> {
    let valid = session.context().model.has_expression(expression_id);
    let ack = if valid {
        AckFrame::success()
    } else {
        AckFrame::error(format!("unknown expression id {expression_id}"))
    };
    session
        .outbound()
        .emit(OutboundFrame::ExpressionAck(ack))
        .await?;

    if valid {
        let result = session
            .adapter()
            .trigger_expression(expression_id, duration, priority)
            .await?;
        if !result.is_success() {
            warn!(
                "expression {expression_id} dispatch failed on {}: {:?}",
                session.session_id(),
                result.error
            );
        }
    }
    Ok(())
}

async fn handle_motion(
    session: &Arc<Session>,
    group: &str,
    index: u32,
    looped: bool,
    priority: i32,
) -> Result<()> {
    let valid = session.context().model.has_motion_group(group);
    let ack = if valid {
        AckFrame::success()
    } else {
        AckFrame::error(format!("unknown motion group {group}"))
    };
    session.outbound().emit(OutboundFrame::MotionAck(ack)).await?;

    if valid {
        let result = session
            .adapter()
            .trigger_motion(group, index, looped, priority)
            .await?;
        if !result.is_success() {
            warn!(
                "motion {group}/{index} dispatch failed on {}: {:?}",
                session.session_id(),
                result.error
            );
        }
    }
    Ok(())
}

/// Full conversational turn: agent reply streamed as partial text, then
/// emotion extraction and speech.
async fn handle_text_input(session: &Arc<Session>, text: &str) -> Result<()> {
    let context = session.context();
    let reply = match stream_reply(session, text).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_owned(),
        Ok(_) => {
            debug!("agent returned empty reply on {}", session.session_id());
            return Ok(());
        }
        Err(e) => {
            session
                .outbound()
                .emit(OutboundFrame::Error {
                    message: format!("response generation failed: {e}"),
                })
                .await?;
            return Err(e);
        }
    };

    let expressions = extract_emotions(&reply, context.model.emotion_map());
    let display = strip_emotion_tags(&reply, context.model.emotion_map());

    session
        .outbound()
        .emit(OutboundFrame::FullText {
            text: display.clone(),
        })
        .await?;

    let result = session
        .adapter()
        .speak(SpeakRequest {
            text: display.clone(),
            expressions,
            motions: Vec::new(),
            skip_tts: false,
            display_text: Some(display),
        })
        .await?;
    if !result.is_success() {
        warn!(
            "speak failed on {}: {:?}",
            session.session_id(),
            result.error
        );
    }
    Ok(())
}

/// Drain one agent call, reflecting each chunk as a `partial-text` frame.
async fn stream_reply(session: &Arc<Session>, text: &str) -> Result<String> {
    let agent = Arc::clone(&session.context().agent);
    tokio::time::timeout(crate::engine::EXTERNAL_CALL_TIMEOUT, async {
        let mut rx = agent.chat(text, None).await?;
        let mut reply = String::new();
        while let Some(chunk) = rx.recv().await {
            reply.push_str(&chunk);
            session
                .outbound()
                .emit(OutboundFrame::PartialText { text: chunk })
                .await?;
        }
        Ok(reply)
    })
    .await
    .map_err(|_| crate::error::ControlError::ExternalService("agent call timed out".to_owned()))?
}

async fn handle_text_generation(
    session: &Arc<Session>,
    prompt: &str,
    context: Option<&serde_json::Value>,
) -> Result<()> {
    match session.adapter().generate_text(prompt, context).await {
        Ok(_) => Ok(()),
        Err(e) => {
            session
                .outbound()
                .emit(OutboundFrame::Error {
                    message: format!("text generation failed: {e}"),
                })
                .await?;
            Err(e)
        }
    }
}

/// Transcribe the buffered utterance, reflect it, then run the text flow.
async fn handle_mic_end(session: &Arc<Session>) -> Result<()> {
    let samples = session.take_mic_audio();
    if samples.is_empty() {
        debug!("mic-audio-end with empty buffer on {}", session.session_id());
        return Ok(());
    }

    let text = match session.context().asr.transcribe(&samples).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => return Ok(()),
        Err(e) => {
            session
                .outbound()
                .emit(OutboundFrame::Error {
                    message: format!("transcription failed: {e}"),
                })
                .await?;
            return Err(e);
        }
    };

    session
        .outbound()
        .emit(OutboundFrame::UserInputTranscription { text: text.clone() })
        .await?;
    handle_text_input(session, &text).await
}
