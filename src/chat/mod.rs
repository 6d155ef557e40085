//! Chat ingest: external platform messages → spam filter → quality gate →
//! response selection → animation dispatch.
//!
//! Platform clients are pluggable through [`ChatSource`]; the pipeline
//! consumes a bounded queue of [`ChatMessage`] and speaks replies through
//! the presenter session.

pub mod quality;
pub mod responder;
pub mod spam;

use crate::adapter::SpeakRequest;
use crate::emotion::{extract_emotions, strip_emotion_tags};
use crate::error::Result;
use crate::frames::OutboundFrame;
use crate::session::registry::SessionRegistry;
use async_trait::async_trait;
use quality::QualityScorer;
use responder::ResponseSelector;
use spam::SpamFilter;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One message received from an external chat platform.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Source platform tag (e.g. `twitch`).
    pub platform: String,
    /// Stable per-platform user identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Message text.
    pub text: String,
    /// Receipt time.
    pub timestamp: SystemTime,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    #[must_use]
    pub fn new(platform: &str, user_id: &str, username: &str, text: &str) -> Self {
        Self {
            platform: platform.to_owned(),
            user_id: user_id.to_owned(),
            username: username.to_owned(),
            text: text.to_owned(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Chat platform client contract. New platforms only implement this trait.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Stable platform identifier (e.g. `twitch`, `webhook`).
    fn id(&self) -> &str;

    /// Start receiving messages and forwarding them to the pipeline.
    async fn run(&self, inbound_tx: mpsc::Sender<ChatMessage>) -> anyhow::Result<()>;
}

/// Supervise platform sources, restarting each with exponential backoff.
///
/// A source returning cleanly or with an error is restarted; the loop only
/// ends when the inbound queue is closed.
pub fn spawn_sources(
    sources: Vec<Arc<dyn ChatSource>>,
    inbound_tx: mpsc::Sender<ChatMessage>,
) -> tokio::task::JoinSet<()> {
    let mut workers = tokio::task::JoinSet::new();
    for source in sources {
        let tx = inbound_tx.clone();
        workers.spawn(async move {
            let mut backoff_secs = 2u64;
            loop {
                match source.run(tx.clone()).await {
                    Ok(()) => {
                        warn!("chat source {} stopped; restarting", source.id());
                    }
                    Err(e) => {
                        warn!(
                            "chat source {} failed: {e}; retrying in {backoff_secs}s",
                            source.id()
                        );
                    }
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                backoff_secs = backoff_secs.saturating_mul(2).min(60);
            }
        });
    }
    workers
}

/// The ingest pipeline binding filters, scorer and selector to dispatch.
pub struct ChatPipeline {
    registry: Arc<SessionRegistry>,
    presenter: String,
    spam: Mutex<SpamFilter>,
    quality: Mutex<QualityScorer>,
    selector: ResponseSelector,
}

impl ChatPipeline {
    /// Create a pipeline speaking through `presenter`.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, presenter: String) -> Self {
        Self {
            registry,
            presenter,
            spam: Mutex::new(SpamFilter::new()),
            quality: Mutex::new(QualityScorer::new()),
            selector: ResponseSelector::new(),
        }
    }

    /// Drain the inbound queue until every sender is dropped.
    pub fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ChatMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("chat ingest pipeline started");
            while let Some(message) = rx.recv().await {
                if let Err(e) = self.process(message).await {
                    warn!("chat message dropped: {e}");
                }
            }
            info!("chat ingest pipeline stopped");
        })
    }

    /// Run one message through the full pipeline. Returns whether a reply
    /// was dispatched.
    pub async fn process(&self, message: ChatMessage) -> Result<bool> {
        let verdict = self
            .spam
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(&message);
        if verdict.is_spam {
            debug!(
                "spam from {} on {}: {}",
                message.username, message.platform, verdict.reason
            );
            return Ok(false);
        }

        let presenter = self.registry.get_or_default(&self.presenter).await;
        let context = Arc::clone(presenter.context());

        let verdict = self
            .quality
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .should_respond(&message, context.model.character_name());
        if !verdict.respond {
            debug!(
                "skipping {} message from {}: {} (score {:.2})",
                message.platform, message.username, verdict.reason, verdict.score
            );
            return Ok(false);
        }
        info!(
            "responding to {} message from {} (score {:.2})",
            message.platform, message.username, verdict.score
        );

        let generation_context = serde_json::json!({
            "source": "chat_platform",
            "platform": message.platform,
            "username": message.username,
        });
        let reply = self
            .selector
            .select_best(
                context.agent.as_ref(),
                &message.text,
                Some(&generation_context),
            )
            .await;
        if reply.is_empty() {
            warn!("no usable reply for message from {}", message.username);
            return Ok(false);
        }

        let expressions = extract_emotions(&reply, context.model.emotion_map());
        let display = strip_emotion_tags(&reply, context.model.emotion_map());

        let result = presenter
            .adapter()
            .speak(SpeakRequest {
                text: display.clone(),
                expressions,
                motions: Vec::new(),
                skip_tts: false,
                display_text: Some(display.clone()),
            })
            .await?;
        if !result.is_success() {
            warn!("presenter speak failed: {:?}", result.error);
            return Ok(false);
        }

        self.registry
            .broadcast(None, OutboundFrame::AutonomousChat { text: display })
            .await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::CharacterConfig;
    use crate::model::LiveModel;
    use crate::session::SessionContext;
    use crate::test_utils::{ScriptedAgent, ScriptedAsr, ScriptedTts};

    fn registry_with_agent(agent: ScriptedAgent) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(Arc::new(SessionContext {
            model: Arc::new(LiveModel::from_config(&CharacterConfig::default())),
            agent: Arc::new(agent),
            tts: Arc::new(ScriptedTts::new()),
            asr: Arc::new(ScriptedAsr::new("")),
        })))
    }

    fn good_message(user: &str) -> ChatMessage {
        ChatMessage::new(
            "twitch",
            user,
            user,
            "What do you think about rust, stagehand?",
        )
    }

    #[tokio::test]
    async fn spam_is_dropped_before_scoring() {
        let registry = registry_with_agent(ScriptedAgent::new(vec!["reply".to_owned()]));
        let pipeline = ChatPipeline::new(Arc::clone(&registry), "default".to_owned());

        let dispatched = pipeline
            .process(ChatMessage::new(
                "twitch",
                "spammer",
                "spammer",
                "buy now at https://example.com",
            ))
            .await
            .expect("process");
        assert!(!dispatched);
        // No presenter session was ever created for a dropped message.
        assert!(registry.get("default").await.is_none());
    }

    #[tokio::test]
    async fn low_quality_is_dropped() {
        let registry = registry_with_agent(ScriptedAgent::new(vec!["reply".to_owned()]));
        let pipeline = ChatPipeline::new(Arc::clone(&registry), "default".to_owned());

        let dispatched = pipeline
            .process(ChatMessage::new("twitch", "quiet", "quiet", "ok then"))
            .await
            .expect("process");
        assert!(!dispatched);
    }

    #[tokio::test]
    async fn good_message_speaks_and_broadcasts() {
        let registry = registry_with_agent(ScriptedAgent::new(vec![
            "Rust is great [joy] honestly".to_owned(),
        ]));
        let (_presenter, mut presenter_rx) = registry.register("default".to_owned()).await;
        let (_viewer, mut viewer_rx) = registry.register("viewer".to_owned()).await;
        let pipeline = ChatPipeline::new(Arc::clone(&registry), "default".to_owned());

        let dispatched = pipeline
            .process(good_message("alice"))
            .await
            .expect("process");
        assert!(dispatched);

        match presenter_rx.recv().await.expect("audio") {
            OutboundFrame::Audio(frame) => {
                assert_eq!(frame.actions.expect("actions").expressions, vec![3]);
                assert_eq!(
                    frame.display_text.expect("display").text,
                    "Rust is great  honestly"
                );
            }
            other => unreachable!("unexpected frame {other:?}"),
        }
        assert!(matches!(
            presenter_rx.recv().await.expect("chat copy"),
            OutboundFrame::AutonomousChat { .. }
        ));
        assert!(matches!(
            viewer_rx.recv().await.expect("chat copy"),
            OutboundFrame::AutonomousChat { .. }
        ));
    }

    #[tokio::test]
    async fn empty_reply_is_not_dispatched() {
        let registry = registry_with_agent(ScriptedAgent::failing("offline"));
        let (_presenter, mut presenter_rx) = registry.register("default".to_owned()).await;
        let pipeline = ChatPipeline::new(Arc::clone(&registry), "default".to_owned());

        let dispatched = pipeline
            .process(good_message("alice"))
            .await
            .expect("process");
        assert!(!dispatched);
        assert!(presenter_rx.try_recv().is_err());
    }

    struct ScriptedSource {
        messages: Vec<ChatMessage>,
    }

    #[async_trait]
    impl ChatSource for ScriptedSource {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn run(&self, inbound_tx: mpsc::Sender<ChatMessage>) -> anyhow::Result<()> {
            for message in &self.messages {
                inbound_tx.send(message.clone()).await?;
            }
            // Park instead of returning so the supervisor does not restart
            // and resend the script.
            std::future::pending::<anyhow::Result<()>>().await
        }
    }

    #[tokio::test]
    async fn sources_forward_into_the_pipeline_queue() {
        let (tx, mut rx) = mpsc::channel(8);
        let source: Arc<dyn ChatSource> = Arc::new(ScriptedSource {
            messages: vec![
                ChatMessage::new("twitch", "a", "a", "first message"),
                ChatMessage::new("twitch", "b", "b", "second message"),
            ],
        });
        let mut workers = spawn_sources(vec![source], tx);

        assert_eq!(rx.recv().await.expect("message").text, "first message");
        assert_eq!(rx.recv().await.expect("message").text, "second message");
        workers.abort_all();
    }

    #[tokio::test]
    async fn cooldown_limits_one_response_per_user() {
        let registry = registry_with_agent(ScriptedAgent::new(vec!["A reply".to_owned()]));
        let (_presenter, _presenter_rx) = registry.register("default".to_owned()).await;
        let pipeline = ChatPipeline::new(Arc::clone(&registry), "default".to_owned());

        assert!(pipeline
            .process(good_message("alice"))
            .await
            .expect("process"));
        // Second message inside the 30s window is gated.
        assert!(!pipeline
            .process(ChatMessage::new(
                "twitch",
                "alice",
                "alice",
                "And a follow-up question, stagehand?",
            ))
            .await
            .expect("process"));
        // A different user is unaffected.
        assert!(pipeline
            .process(ChatMessage::new(
                "twitch",
                "bob",
                "bob",
                "What would you make of tokio, stagehand?",
            ))
            .await
            .expect("process"));
    }
}
