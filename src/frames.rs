//! Wire frame types for the renderer streaming protocol.
//!
//! Every message on a client connection is one JSON object tagged by a
//! `type` field. Outbound frames flow from the control plane to the
//! renderer; inbound frames are the client command vocabulary.

use serde::{Deserialize, Serialize};

/// Backend mode a session operates in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendMode {
    /// Default mode: commands synthesize locally and stream to the renderer.
    #[default]
    Internal,
    /// External services drive the character with pre-generated content.
    ExternalApi,
    /// The autonomous scheduler drives the character.
    Autonomous,
}

impl BackendMode {
    /// Stable wire name for the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackendMode::Internal => "internal",
            BackendMode::ExternalApi => "external-api",
            BackendMode::Autonomous => "autonomous",
        }
    }
}

/// Text block attached to an audio frame for on-screen captions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayText {
    /// Caption text (emotion tags already stripped).
    pub text: String,
    /// Speaker display name.
    pub name: String,
    /// Avatar reference.
    #[serde(default)]
    pub avatar: String,
}

/// A motion to play, carried inside actions or speak requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSpec {
    /// Motion group name (e.g. `idle`).
    pub group: String,
    /// Motion index within the group.
    pub index: u32,
    /// Whether the motion loops.
    #[serde(default, rename = "loop")]
    pub looped: bool,
    /// Renderer priority hint, forwarded untouched.
    #[serde(default)]
    pub priority: i32,
}

/// Animation actions attached to a speech event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actions {
    /// Expression IDs to apply, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<i64>,
    /// Motions to trigger, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub motions: Vec<MotionSpec>,
}

impl Actions {
    /// Whether the action set carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty() && self.motions.is_empty()
    }
}

/// Outbound audio/speech frame. `audio` is `None` for expression-only
/// events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Base64-encoded audio bytes, or `null` when there is no audio.
    pub audio: Option<String>,
    /// Audio container format (e.g. `wav`).
    #[serde(default)]
    pub format: String,
    /// Lip-sync volume samples.
    #[serde(default)]
    pub volumes: Vec<f32>,
    /// Duration of each volume slice in milliseconds.
    #[serde(default)]
    pub slice_length_ms: u64,
    /// Caption block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<DisplayText>,
    /// Animation actions for this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    /// True only when re-broadcast from another session.
    #[serde(default)]
    pub forwarded: bool,
}

/// Outbound motion frame, carried separately from audio because motions can
/// fire without speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionFrame {
    /// Motion group name.
    pub motion_group: String,
    /// Motion index within the group.
    pub motion_index: u32,
    /// Whether the motion loops.
    #[serde(rename = "loop")]
    pub looped: bool,
    /// Renderer priority hint.
    pub priority: i32,
}

/// Acknowledgement of a stream command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckFrame {
    /// `success` or `error`.
    pub status: String,
    /// Error detail when status is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckFrame {
    /// Successful ack.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: "success".to_owned(),
            error: None,
        }
    }

    /// Failed ack with a reason.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_owned(),
            error: Some(message.into()),
        }
    }
}

/// Frames delivered to the renderer, one JSON object each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundFrame {
    /// Speech/expression payload.
    Audio(AudioFrame),
    /// Standalone motion command.
    MotionCommand(MotionFrame),
    /// Ack for an `expression-command`.
    ExpressionAck(AckFrame),
    /// Ack for a `motion-command`.
    MotionAck(AckFrame),
    /// Reply to `set-backend-mode` / `get-backend-mode`.
    BackendModeSet {
        /// The session's (new) mode.
        mode: BackendMode,
    },
    /// Incremental text-generation output.
    TextGenerationChunk {
        /// Chunk text.
        text: String,
    },
    /// Terminal text-generation result.
    TextGenerationResponse {
        /// Full generated text.
        text: String,
    },
    /// User speech transcription reflected after ASR.
    UserInputTranscription {
        /// Transcribed text.
        text: String,
    },
    /// Informational copy of autonomous speech for UI chat.
    AutonomousChat {
        /// Spoken text (tags stripped).
        text: String,
    },
    /// Complete agent text for display.
    FullText {
        /// Display text.
        text: String,
    },
    /// Partial agent text for display.
    PartialText {
        /// Display text so far.
        text: String,
    },
    /// Non-fatal error notification.
    Error {
        /// Human-readable message.
        message: String,
    },
}

/// Commands accepted from a streaming client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundFrame {
    /// Trigger an expression.
    ExpressionCommand {
        /// Expression preset ID.
        expression_id: i64,
        /// Milliseconds until reset; `0` is permanent.
        #[serde(default)]
        duration: u64,
        /// Renderer priority hint.
        #[serde(default)]
        priority: i32,
    },
    /// Trigger a motion.
    MotionCommand {
        /// Motion group name.
        motion_group: String,
        /// Motion index within the group.
        motion_index: u32,
        /// Whether the motion loops.
        #[serde(default, rename = "loop")]
        looped: bool,
        /// Renderer priority hint.
        #[serde(default)]
        priority: i32,
    },
    /// Conversational text input.
    TextInput {
        /// User text.
        text: String,
    },
    /// Raw text generation request (streamed back as chunks).
    TextGenerationRequest {
        /// Prompt text.
        prompt: String,
        /// Optional generation context.
        #[serde(default)]
        context: Option<serde_json::Value>,
    },
    /// Switch the session's backend mode.
    SetBackendMode {
        /// Requested mode.
        mode: BackendMode,
    },
    /// Query the session's backend mode.
    GetBackendMode,
    /// Microphone samples for the current utterance.
    MicAudioData {
        /// f32 PCM samples.
        #[serde(default)]
        audio: Vec<f32>,
    },
    /// End of the current utterance; triggers transcription.
    MicAudioEnd,
}
