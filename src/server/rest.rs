//! REST endpoints of the control plane.
//!
//! Bodies are parsed from raw JSON so malformed payloads map to HTTP 400.
//! Domain failures (unknown expression, collaborator errors) come back as
//! HTTP 200 with a `status: "error"` payload; only payload malformation is
//! a client error.

use crate::adapter::SpeakRequest;
use crate::frames::MotionSpec;
use crate::server::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

/// Name of the alternate client-UID carrier header.
const CLIENT_UID_HEADER: &str = "x-client-uid";

fn bad_request(message: impl std::fmt::Display) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.to_string() })),
    )
        .into_response()
}

/// Body field wins over the header; `default` is the fallback session.
fn resolve_client_uid(body_uid: Option<String>, headers: &HeaderMap) -> String {
    body_uid
        .filter(|uid| !uid.is_empty())
        .or_else(|| {
            headers
                .get(CLIENT_UID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .filter(|uid| !uid.is_empty())
        })
        .unwrap_or_else(|| "default".to_owned())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.registry.len().await,
    }))
}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    #[serde(default = "default_platform")]
    platform: String,
    user_id: String,
    #[serde(default)]
    username: Option<String>,
    text: String,
}

fn default_platform() -> String {
    "webhook".to_owned()
}

/// Generic webhook for chat sources without a dedicated client.
pub(crate) async fn chat_message(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Response {
    let body: ChatMessageBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(e) => return bad_request(e),
    };

    let user_id = body.user_id.trim();
    let text = body.text.trim();
    if user_id.is_empty() || text.is_empty() {
        return bad_request("user_id and text are required");
    }

    let username = body
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(user_id);
    let message = crate::chat::ChatMessage::new(&body.platform, user_id, username, text);
    if state.chat_tx.try_send(message).is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "chat pipeline unavailable" })),
        )
            .into_response();
    }

    Json(json!({ "queued": true })).into_response()
}

#[derive(Debug, Deserialize)]
struct ExpressionBody {
    #[serde(rename = "expressionId")]
    expression_id: i64,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    client_uid: Option<String>,
}

pub(crate) async fn expression(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let body: ExpressionBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(e) => return bad_request(e),
    };

    let client_uid = resolve_client_uid(body.client_uid.clone(), &headers);
    let session = state.registry.get_or_default(&client_uid).await;
    let result = match session
        .adapter()
        .trigger_expression(body.expression_id, body.duration, body.priority)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("expression dispatch failed for {client_uid}: {e}");
            crate::adapter::AdapterResult::error(e.to_string())
        }
    };

    info!(
        "expression {} for client {client_uid} (duration={}, priority={}): {}",
        body.expression_id, body.duration, body.priority, result.status
    );
    Json(json!({
        "status": result.status,
        "expression_id": body.expression_id,
        "result": result,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct MotionBody {
    #[serde(rename = "motionGroup")]
    motion_group: String,
    #[serde(rename = "motionIndex")]
    motion_index: u32,
    #[serde(default, rename = "loop")]
    looped: bool,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    client_uid: Option<String>,
}

pub(crate) async fn motion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let body: MotionBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(e) => return bad_request(e),
    };

    let client_uid = resolve_client_uid(body.client_uid.clone(), &headers);
    let session = state.registry.get_or_default(&client_uid).await;
    let result = match session
        .adapter()
        .trigger_motion(&body.motion_group, body.motion_index, body.looped, body.priority)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("motion dispatch failed for {client_uid}: {e}");
            crate::adapter::AdapterResult::error(e.to_string())
        }
    };

    info!(
        "motion {}/{} for client {client_uid} (loop={}, priority={}): {}",
        body.motion_group, body.motion_index, body.looped, body.priority, result.status
    );
    Json(json!({
        "status": result.status,
        "motion_group": body.motion_group,
        "motion_index": body.motion_index,
        "result": result,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct SpeakBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    expressions: Option<Vec<i64>>,
    #[serde(default)]
    motions: Option<Vec<MotionSpec>>,
    #[serde(default)]
    client_uid: Option<String>,
    #[serde(default)]
    skip_tts: bool,
    #[serde(default)]
    metadata: Option<Value>,
}

pub(crate) async fn autonomous_speak(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let body: SpeakBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(e) => return bad_request(e),
    };

    let text = body.text.clone().unwrap_or_default().trim().to_owned();
    let expressions = body.expressions.clone().unwrap_or_default();
    let motions = body.motions.clone().unwrap_or_default();
    if text.is_empty() && expressions.is_empty() && motions.is_empty() {
        return bad_request("at least one of 'text', 'expressions', or 'motions' is required");
    }

    let client_uid = resolve_client_uid(body.client_uid.clone(), &headers);
    let message_id = Uuid::new_v4().to_string();
    let session = state.registry.get_or_default(&client_uid).await;
    let result = match session
        .adapter()
        .speak(SpeakRequest {
            text: text.clone(),
            expressions: expressions.clone(),
            motions: motions.clone(),
            skip_tts: body.skip_tts,
            display_text: None,
        })
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("speak dispatch failed for {client_uid}: {e}");
            crate::adapter::AdapterResult::error(e.to_string())
        }
    };

    let tts_generated = result
        .detail
        .get("tts_generated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    info!(
        "external speak for client {client_uid} ({} chars, {} expressions, {} motions, tts={}): {}",
        text.len(),
        expressions.len(),
        motions.len(),
        tts_generated,
        result.status
    );

    Json(json!({
        "status": result.status,
        "message_id": message_id,
        "text": text,
        "expressions": expressions,
        "motions": motions
            .iter()
            .map(|m| format!("{}/{}", m.group, m.index))
            .collect::<Vec<_>>(),
        "tts_generated": tts_generated,
        "metadata": body.metadata.unwrap_or_else(|| json!({})),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    context: Option<Value>,
}

pub(crate) async fn autonomous_generate(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Response {
    let body: GenerateBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(e) => return bad_request(e),
    };
    if body.prompt.trim().is_empty() {
        return bad_request("prompt is required");
    }

    let session = state.registry.get_or_default("default").await;
    let model = session.context().model.clone();
    match session
        .adapter()
        .generate_text(&body.prompt, body.context.as_ref())
        .await
    {
        Ok(text) => {
            info!("autonomous generation produced {} chars", text.len());
            Json(json!({
                "text": text,
                "metadata": {
                    "character": model.character_name(),
                    "character_id": model.character_id(),
                },
            }))
            .into_response()
        }
        Err(e) => {
            error!("autonomous generation failed: {e}");
            Json(json!({
                "text": "",
                "metadata": { "error": e.to_string() },
            }))
            .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ControlBody {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    min_interval: Option<f64>,
    #[serde(default)]
    max_interval: Option<f64>,
}

pub(crate) async fn autonomous_control(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Response {
    let body: ControlBody = match serde_json::from_value(payload) {
        Ok(body) => body,
        Err(e) => return bad_request(e),
    };

    if let Some(enabled) = body.enabled {
        state.autonomous.set_enabled(enabled);
    }

    if body.min_interval.is_some() || body.max_interval.is_some() {
        let current = state.autonomous.snapshot();
        let min = body.min_interval.unwrap_or(current.min_interval_seconds);
        let max = body.max_interval.unwrap_or(current.max_interval_seconds);
        if let Err(e) = state.autonomous.set_intervals(min, max) {
            return bad_request(e);
        }
    }

    let snapshot = state.autonomous.snapshot();
    Json(json!({
        "status": "success",
        "enabled": snapshot.enabled,
        "min_interval": snapshot.min_interval_seconds,
        "max_interval": snapshot.max_interval_seconds,
    }))
    .into_response()
}

pub(crate) async fn autonomous_status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.autonomous.snapshot();
    let model = std::sync::Arc::clone(&state.registry.defaults().model);
    let mode = if snapshot.enabled { "autonomous" } else { "manual" };
    Json(json!({
        "mode": mode,
        "active": snapshot.enabled,
        "character": model.character_name(),
        "character_id": model.character_id(),
        "autonomous_generator_enabled": snapshot.enabled,
        "autonomous_generator_interval": snapshot.min_interval_seconds,
        "min_interval_seconds": snapshot.min_interval_seconds,
        "max_interval_seconds": snapshot.max_interval_seconds,
        "auto_responses_enabled": true,
    }))
}
