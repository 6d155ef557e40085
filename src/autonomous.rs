//! Autonomous speech generator.
//!
//! A single long-lived task sleeps a random interval, then produces one
//! speech event through the response selector and dispatches it to every
//! session in autonomous mode. Control values are read fresh at the top of
//! each iteration; changes never interrupt an in-flight tick.

use crate::adapter::SpeakRequest;
use crate::chat::responder::ResponseSelector;
use crate::config::AutonomousConfig;
use crate::emotion::{extract_emotions, strip_emotion_tags};
use crate::error::{ControlError, Result};
use crate::frames::{BackendMode, OutboundFrame};
use crate::session::registry::SessionRegistry;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Point-in-time view of the generator policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutonomousSnapshot {
    /// Whether ticks produce speech events.
    pub enabled: bool,
    /// Minimum seconds between events.
    pub min_interval_seconds: f64,
    /// Maximum seconds between events.
    pub max_interval_seconds: f64,
}

struct SharedPolicy {
    enabled: AtomicBool,
    intervals: Mutex<(f64, f64)>,
    prompts: Vec<String>,
}

/// Runtime control surface over the generator, safe to clone into handlers.
#[derive(Clone)]
pub struct AutonomousHandle {
    policy: Arc<SharedPolicy>,
}

impl AutonomousHandle {
    /// Enable or disable speech generation. Takes effect at the next tick.
    pub fn set_enabled(&self, enabled: bool) {
        self.policy.enabled.store(enabled, Ordering::SeqCst);
        info!("autonomous generator {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Update the interval range. Requires `0 < min <= max`.
    pub fn set_intervals(&self, min_seconds: f64, max_seconds: f64) -> Result<()> {
        if !(min_seconds > 0.0 && min_seconds <= max_seconds) {
            return Err(ControlError::Validation(format!(
                "invalid interval range {min_seconds}..{max_seconds}"
            )));
        }
        *self
            .policy
            .intervals
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = (min_seconds, max_seconds);
        info!("autonomous interval set to {min_seconds}s-{max_seconds}s");
        Ok(())
    }

    /// Current policy values.
    #[must_use]
    pub fn snapshot(&self) -> AutonomousSnapshot {
        let (min, max) = *self
            .policy
            .intervals
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        AutonomousSnapshot {
            enabled: self.policy.enabled.load(Ordering::SeqCst),
            min_interval_seconds: min,
            max_interval_seconds: max,
        }
    }
}

/// Timer-driven generator of autonomous speech events.
pub struct AutonomousGenerator {
    policy: Arc<SharedPolicy>,
    registry: Arc<SessionRegistry>,
    selector: ResponseSelector,
    presenter: String,
}

impl AutonomousGenerator {
    /// Build a generator from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the interval range is invalid or the prompt pool is empty.
    pub fn new(
        config: &AutonomousConfig,
        registry: Arc<SessionRegistry>,
        presenter: String,
    ) -> Result<Self> {
        if !(config.min_interval_seconds > 0.0
            && config.min_interval_seconds <= config.max_interval_seconds)
        {
            return Err(ControlError::Config(format!(
                "invalid autonomous interval range {}..{}",
                config.min_interval_seconds, config.max_interval_seconds
            )));
        }
        if config.prompts.is_empty() {
            return Err(ControlError::Config(
                "autonomous prompt pool is empty".to_owned(),
            ));
        }

        Ok(Self {
            policy: Arc::new(SharedPolicy {
                enabled: AtomicBool::new(config.enabled),
                intervals: Mutex::new((
                    config.min_interval_seconds,
                    config.max_interval_seconds,
                )),
                prompts: config.prompts.clone(),
            }),
            registry,
            selector: ResponseSelector::new(),
            presenter,
        })
    }

    /// Control handle shared with the router.
    #[must_use]
    pub fn handle(&self) -> AutonomousHandle {
        AutonomousHandle {
            policy: Arc::clone(&self.policy),
        }
    }

    /// Start the generator loop.
    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("autonomous generator started");
            loop {
                let wait = self.random_interval();
                debug!("next autonomous tick in {wait:.1}s");
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;

                if !self.policy.enabled.load(Ordering::SeqCst) {
                    continue;
                }
                if let Err(e) = self.tick().await {
                    error!("autonomous tick failed: {e}");
                }
            }
        })
    }

    fn random_interval(&self) -> f64 {
        let (min, max) = *self
            .policy
            .intervals
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        }
    }

    /// One speech event: prompt, selection, extraction, dispatch.
    pub(crate) async fn tick(&self) -> Result<()> {
        if self.registry.is_empty().await {
            debug!("no connected sessions; skipping autonomous tick");
            return Ok(());
        }

        let prompt = self
            .policy
            .prompts
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ControlError::Scheduler("prompt pool is empty".to_owned()))?;
        debug!("autonomous prompt: {prompt}");

        let presenter = self.registry.get_or_default(&self.presenter).await;
        let context = Arc::clone(presenter.context());
        let reply = self
            .selector
            .select_best(context.agent.as_ref(), &prompt, None)
            .await;
        if reply.is_empty() {
            warn!("autonomous generation produced no usable response");
            return Ok(());
        }

        let expressions = extract_emotions(&reply, context.model.emotion_map());
        let display = strip_emotion_tags(&reply, context.model.emotion_map());

        let targets = self.registry.sessions_in_mode(BackendMode::Autonomous).await;
        for session in targets {
            let result = session
                .adapter()
                .speak(SpeakRequest {
                    text: display.clone(),
                    expressions: expressions.clone(),
                    motions: Vec::new(),
                    skip_tts: false,
                    display_text: Some(display.clone()),
                })
                .await;
            match result {
                Ok(result) if result.is_success() => {}
                Ok(result) => warn!(
                    "autonomous speak failed on {}: {:?}",
                    session.session_id(),
                    result.error
                ),
                Err(e) => warn!(
                    "autonomous speak errored on {}: {e}",
                    session.session_id()
                ),
            }
        }

        self.registry
            .broadcast(None, OutboundFrame::AutonomousChat { text: display })
            .await;
        Ok(())
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

    fn generator(registry: Arc<SessionRegistry>) -> AutonomousGenerator {
        AutonomousGenerator::new(
            &AutonomousConfig::default(),
            registry,
            "default".to_owned(),
        )
        .expect("generator")
    }

    #[test]
    fn rejects_bad_interval_config() {
        let registry = registry_with_agent(ScriptedAgent::new(Vec::new()));
        let bad = AutonomousConfig {
            min_interval_seconds: 300.0,
            max_interval_seconds: 120.0,
            ..AutonomousConfig::default()
        };
        assert!(AutonomousGenerator::new(&bad, registry, "default".to_owned()).is_err());
    }

    #[test]
    fn rejects_empty_prompt_pool() {
        let registry = registry_with_agent(ScriptedAgent::new(Vec::new()));
        let bad = AutonomousConfig {
            prompts: Vec::new(),
            ..AutonomousConfig::default()
        };
        assert!(AutonomousGenerator::new(&bad, registry, "default".to_owned()).is_err());
    }

    #[test]
    fn set_intervals_then_snapshot_round_trips() {
        let registry = registry_with_agent(ScriptedAgent::new(Vec::new()));
        let generator = generator(registry);
        let handle = generator.handle();

        handle.set_intervals(45.0, 90.0).expect("set intervals");
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.min_interval_seconds, 45.0);
        assert_eq!(snapshot.max_interval_seconds, 90.0);

        handle.set_enabled(true);
        assert!(handle.snapshot().enabled);
        handle.set_enabled(false);
        assert!(!handle.snapshot().enabled);
    }

    #[test]
    fn set_intervals_validates_range() {
        let registry = registry_with_agent(ScriptedAgent::new(Vec::new()));
        let handle = generator(registry).handle();
        assert!(handle.set_intervals(0.0, 10.0).is_err());
        assert!(handle.set_intervals(20.0, 10.0).is_err());
        assert!(handle.set_intervals(10.0, 10.0).is_ok());
    }

    #[test]
    fn random_interval_stays_in_range() {
        let registry = registry_with_agent(ScriptedAgent::new(Vec::new()));
        let generator = generator(registry);
        generator.handle().set_intervals(30.0, 60.0).expect("set");
        for _ in 0..100 {
            let interval = generator.random_interval();
            assert!((30.0..=60.0).contains(&interval), "got {interval}");
        }
    }

    #[tokio::test]
    async fn tick_speaks_to_autonomous_sessions_only() {
        let registry = registry_with_agent(ScriptedAgent::new(vec![
            "A spontaneous [joy] remark".to_owned(),
        ]));
        let (auto_session, mut auto_rx) = registry.register("auto".to_owned()).await;
        auto_session.set_mode(BackendMode::Autonomous);
        let (_idle, mut idle_rx) = registry.register("idle".to_owned()).await;

        let generator = generator(Arc::clone(&registry));
        generator.tick().await.expect("tick");

        // Autonomous session gets the speech event, then the chat copy.
        match auto_rx.recv().await.expect("audio") {
            OutboundFrame::Audio(frame) => {
                assert_eq!(frame.actions.expect("actions").expressions, vec![3]);
                assert_eq!(
                    frame.display_text.expect("display").text,
                    "A spontaneous  remark"
                );
            }
            other => unreachable!("unexpected frame {other:?}"),
        }
        assert!(matches!(
            auto_rx.recv().await.expect("chat copy"),
            OutboundFrame::AutonomousChat { .. }
        ));

        // The internal-mode session only sees the informational chat copy.
        match idle_rx.recv().await.expect("chat copy") {
            OutboundFrame::AutonomousChat { text } => {
                assert_eq!(text, "A spontaneous  remark");
            }
            other => unreachable!("unexpected frame {other:?}"),
        }
        assert!(idle_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tick_with_no_sessions_is_a_no_op() {
        let agent = ScriptedAgent::new(vec!["unused".to_owned()]);
        let registry = registry_with_agent(agent);
        let generator = generator(Arc::clone(&registry));
        generator.tick().await.expect("tick");
        // No sessions were registered, so the agent was never consulted.
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn tick_without_usable_reply_dispatches_nothing() {
        let registry = registry_with_agent(ScriptedAgent::failing("offline"));
        let (auto_session, mut auto_rx) = registry.register("auto".to_owned()).await;
        auto_session.set_mode(BackendMode::Autonomous);

        let generator = generator(Arc::clone(&registry));
        generator.tick().await.expect("tick");
        assert!(auto_rx.try_recv().is_err());
    }
}
