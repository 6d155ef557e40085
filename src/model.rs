//! Live-model descriptor loaded per session.

use crate::config::CharacterConfig;
use std::collections::HashMap;

/// Descriptor of the renderer model a session animates.
///
/// Immutable for the lifetime of a session. Emotion map keys are stored
/// lowercased so tag lookup is case-insensitive.
#[derive(Debug, Clone)]
pub struct LiveModel {
    character_name: String,
    character_id: String,
    avatar: String,
    emotion_map: HashMap<String, i64>,
    motion_groups: HashMap<String, Vec<u32>>,
    default_expression: i64,
}

impl LiveModel {
    /// Build a model descriptor from character configuration.
    #[must_use]
    pub fn from_config(config: &CharacterConfig) -> Self {
        let emotion_map = config
            .emotion_map
            .iter()
            .map(|(token, id)| (token.to_lowercase(), *id))
            .collect();
        Self {
            character_name: config.name.clone(),
            character_id: config.character_id.clone(),
            avatar: config.avatar.clone(),
            emotion_map,
            motion_groups: config.motion_groups.clone(),
            default_expression: config.default_expression,
        }
    }

    /// Character display name.
    #[must_use]
    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    /// Stable character identifier.
    #[must_use]
    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    /// Avatar reference for display text.
    #[must_use]
    pub fn avatar(&self) -> &str {
        &self.avatar
    }

    /// Emotion token → expression ID map (keys lowercased).
    #[must_use]
    pub fn emotion_map(&self) -> &HashMap<String, i64> {
        &self.emotion_map
    }

    /// Expression restored after a timed expression elapses.
    #[must_use]
    pub fn default_expression(&self) -> i64 {
        self.default_expression
    }

    /// Whether `expression_id` is a known (non-negative, mapped) expression.
    #[must_use]
    pub fn has_expression(&self, expression_id: i64) -> bool {
        expression_id >= 0 && self.emotion_map.values().any(|id| *id == expression_id)
    }

    /// Whether the motion group exists and contains `index`.
    #[must_use]
    pub fn has_motion(&self, group: &str, index: u32) -> bool {
        self.motion_groups
            .get(group)
            .is_some_and(|indices| indices.contains(&index))
    }

    /// Whether the motion group exists at all.
    #[must_use]
    pub fn has_motion_group(&self, group: &str) -> bool {
        self.motion_groups.contains_key(group)
    }
}
