//! Quality scoring that gates which chat messages receive responses.
//!
//! A per-user cooldown runs first; surviving messages get a weighted score
//! over five features and respond when the score clears the threshold.

use crate::chat::ChatMessage;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Minimum seconds between responses to the same user.
const RESPONSE_COOLDOWN: Duration = Duration::from_secs(30);
/// Cooldown entries older than this are swept on write.
const COOLDOWN_SWEEP: Duration = Duration::from_secs(300);
/// Minimum score that earns a response.
const MIN_QUALITY_SCORE: f64 = 0.3;

const WEIGHT_LENGTH: f64 = 0.1;
const WEIGHT_QUESTION: f64 = 0.3;
const WEIGHT_MENTION: f64 = 0.2;
const WEIGHT_ENGAGEMENT: f64 = 0.2;
const WEIGHT_UNIQUENESS: f64 = 0.2;

/// Placeholder uniqueness multiplier; messages are assumed mostly unique.
const UNIQUENESS_DEFAULT: f64 = 0.7;

/// Verdict produced per message.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityVerdict {
    /// Whether a response should be generated.
    pub respond: bool,
    /// Quality score in `[0, 1]`.
    pub score: f64,
    /// Reason code for the decision.
    pub reason: String,
}

/// Scorer with per-user response cooldowns.
pub struct QualityScorer {
    last_response: HashMap<String, Instant>,
}

impl QualityScorer {
    /// Create a scorer with no response history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_response: HashMap::new(),
        }
    }

    /// Gate-then-score one message. A positive verdict records the response
    /// timestamp for the user atomically with the decision.
    pub fn should_respond(&mut self, message: &ChatMessage, character_name: &str) -> QualityVerdict {
        self.should_respond_at(message, character_name, Instant::now())
    }

    fn should_respond_at(
        &mut self,
        message: &ChatMessage,
        character_name: &str,
        now: Instant,
    ) -> QualityVerdict {
        if let Some(last) = self.last_response.get(&message.user_id) {
            if now.duration_since(*last) < RESPONSE_COOLDOWN {
                return QualityVerdict {
                    respond: false,
                    score: 0.0,
                    reason: "cooldown".to_owned(),
                };
            }
        }

        let score = quality_score(&message.text, character_name);
        if score >= MIN_QUALITY_SCORE {
            self.last_response
                .retain(|_, at| now.duration_since(*at) <= COOLDOWN_SWEEP);
            self.last_response.insert(message.user_id.clone(), now);
            QualityVerdict {
                respond: true,
                score,
                reason: "quality_threshold_met".to_owned(),
            }
        } else {
            QualityVerdict {
                respond: false,
                score,
                reason: "quality_score_too_low".to_owned(),
            }
        }
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted quality score in `[0, 1]`.
#[must_use]
pub fn quality_score(text: &str, character_name: &str) -> f64 {
    let mut score = 0.0;

    let length = text.chars().count();
    score += WEIGHT_LENGTH
        * if (10..=200).contains(&length) {
            1.0
        } else if (5..10).contains(&length) || (201..=300).contains(&length) {
            0.5
        } else {
            0.1
        };

    if text.contains('?') {
        score += WEIGHT_QUESTION;
    }

    if !character_name.is_empty()
        && text.to_lowercase().contains(&character_name.to_lowercase())
    {
        score += WEIGHT_MENTION;
    }

    let exclamations = text.matches('!').count();
    score += WEIGHT_ENGAGEMENT
        * if (1..=3).contains(&exclamations) {
            0.8
        } else if exclamations == 0 {
            0.5
        } else {
            0.0
        };

    score += WEIGHT_UNIQUENESS * UNIQUENESS_DEFAULT;

    score.min(1.0)
}
