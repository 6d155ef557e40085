//! Multi-option response selection.
//!
//! Requests several candidate responses from the agent with slight prompt
//! variations, scores them on length, uniqueness and naturalness, and
//! returns the best. A failed generation simply drops out of the pool.

use crate::engine::{collect_chat, Agent};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Prompt suffixes applied per candidate to encourage diversity.
const PROMPT_VARIANTS: [&str; 3] = ["", " (respond briefly)", " (respond naturally)"];

/// Number of candidates requested by default.
const DEFAULT_OPTIONS: usize = 3;

/// Selects the best of several generated responses.
pub struct ResponseSelector {
    num_options: usize,
}

impl ResponseSelector {
    /// Selector generating the default number of candidates.
    #[must_use]
    pub fn new() -> Self {
        Self {
            num_options: DEFAULT_OPTIONS,
        }
    }

    /// Generate candidates for `text` and return the best one.
    ///
    /// Returns the empty string when every generation fails or comes back
    /// empty; callers must not dispatch an empty reply.
    pub async fn select_best(
        &self,
        agent: &dyn Agent,
        text: &str,
        context: Option<&serde_json::Value>,
    ) -> String {
        let mut candidates = Vec::new();
        for i in 0..self.num_options {
            let variant = PROMPT_VARIANTS[i % PROMPT_VARIANTS.len()];
            let prompt = format!("{text}{variant}");
            match collect_chat(agent, &prompt, context).await {
                Ok(response) if !response.is_empty() => candidates.push(response),
                Ok(_) => debug!("candidate {i} came back empty"),
                Err(e) => warn!("candidate {i} generation failed: {e}"),
            }
        }

        match candidates.len() {
            0 => String::new(),
            1 => candidates.remove(0),
            _ => {
                let mut best_index = 0;
                let mut best_score = f64::MIN;
                for (i, candidate) in candidates.iter().enumerate() {
                    let others: Vec<&str> = candidates
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, c)| c.as_str())
                        .collect();
                    let score = score_candidate(candidate, &others);
                    // Strict comparison keeps the lowest index on ties.
                    if score > best_score {
                        best_score = score;
                        best_index = i;
                    }
                }
                candidates.swap_remove(best_index)
            }
        }
    }
}

impl Default for ResponseSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Score one candidate against the rest of the pool.
#[must_use]
pub(crate) fn score_candidate(candidate: &str, others: &[&str]) -> f64 {
    let mut score = 0.0;

    let length = candidate.chars().count();
    score += if (20..=150).contains(&length) {
        0.4
    } else if (10..20).contains(&length) || (151..=200).contains(&length) {
        0.2
    } else {
        0.1
    };

    if !others.is_empty() {
        let total: f64 = others
            .iter()
            .map(|other| jaccard_similarity(candidate, other))
            .sum();
        let mean = total / others.len() as f64;
        score += 0.3 * (1.0 - mean);
    }

    if !is_repetitive(candidate) {
        score += 0.3;
    }

    score
}

/// Word-set Jaccard similarity, case-insensitive.
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let words_a: std::collections::HashSet<&str> = a_lower.split_whitespace().collect();
    let words_b: std::collections::HashSet<&str> = b_lower.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Whether any word reaches three occurrences within the first 20 words.
fn is_repetitive(text: &str) -> bool {
    let lower = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in lower.split_whitespace().take(20) {
        let count = counts.entry(word).or_insert(0);
        *count += 1;
        if *count >= 3 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

    use super::*;
    use crate::test_utils::ScriptedAgent;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn requests_three_variants() {
        let agent = ScriptedAgent::queued(vec![
            "A reasonable answer about the topic",
            "Another take on the same topic entirely",
            "A third distinct perspective on it",
        ]);
        let selector = ResponseSelector::new();
        let best = selector.select_best(&agent, "what is rust?", None).await;

        assert!(!best.is_empty());
        assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
        let prompts = agent.prompts.lock().expect("prompts");
        assert_eq!(prompts[0], "what is rust?");
        assert_eq!(prompts[1], "what is rust? (respond briefly)");
        assert_eq!(prompts[2], "what is rust? (respond naturally)");
    }

    #[tokio::test]
    async fn single_survivor_is_returned() {
        let agent = ScriptedAgent::queued_outcomes(vec![
            Err("backend down"),
            Ok("The only answer that made it through"),
            Err("backend down"),
        ]);
        let selector = ResponseSelector::new();
        let best = selector.select_best(&agent, "hello", None).await;
        assert_eq!(best, "The only answer that made it through");
    }

    #[tokio::test]
    async fn all_failures_return_empty() {
        let agent = ScriptedAgent::failing("backend down");
        let selector = ResponseSelector::new();
        let best = selector.select_best(&agent, "hello", None).await;
        assert!(best.is_empty());
    }

    #[test]
    fn length_scoring_prefers_chat_sized_replies() {
        let good = score_candidate("A reply sized comfortably for chat windows", &[]);
        let short = score_candidate("tiny", &[]);
        assert!(good > short);
    }

    #[test]
    fn repetitive_candidates_lose_naturalness() {
        let natural = score_candidate("a varied answer with distinct words here", &[]);
        let repetitive = score_candidate("spam spam spam is all I say", &[]);
        assert!((natural - repetitive - 0.3).abs() < 1e-9);
    }

    #[test]
    fn repetition_outside_first_twenty_words_is_ignored() {
        let mut text = (0..20).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        text.push_str(" echo echo echo");
        assert!(!is_repetitive(&text));
    }

    #[test]
    fn uniqueness_prefers_distinct_candidates() {
        let twin_a = "the exact same answer text";
        let twin_b = "the exact same answer text";
        let distinct = "completely different words chosen here instead";

        let twin_score = score_candidate(twin_a, &[twin_b, distinct]);
        let distinct_score = score_candidate(distinct, &[twin_a, twin_b]);
        assert!(distinct_score > twin_score);
    }

    #[test]
    fn jaccard_basics() {
        assert_eq!(jaccard_similarity("a b c", "a b c"), 1.0);
        assert_eq!(jaccard_similarity("a b", "c d"), 0.0);
        assert_eq!(jaccard_similarity("", "a"), 0.0);
    }
}
