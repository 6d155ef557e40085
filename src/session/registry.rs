//! Session registry: the one map from session IDs to live sessions.
//!
//! The registry is the sole mutator of the session map. Broadcast snapshots
//! the sessions under the read lock and sends outside it, so no lock is
//! ever held across channel I/O.

use crate::frames::{BackendMode, OutboundFrame};
use crate::session::{Session, SessionContext};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Registry of connected (and virtual) sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    defaults: Arc<SessionContext>,
}

impl SessionRegistry {
    /// Create a registry; new sessions inherit the default context.
    #[must_use]
    pub fn new(defaults: Arc<SessionContext>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Default context handed to new sessions.
    #[must_use]
    pub fn defaults(&self) -> &Arc<SessionContext> {
        &self.defaults
    }

    /// Register a session for a newly connected client. Returns the session
    /// and the outbound receiver the caller must drain with a single writer
    /// task.
    pub async fn connect(&self) -> (Arc<Session>, mpsc::Receiver<OutboundFrame>) {
        let session_id = Uuid::new_v4().to_string();
        self.register(session_id).await
    }

    /// Register a session under a caller-chosen ID, replacing any previous
    /// holder of that ID.
    pub async fn register(
        &self,
        session_id: String,
    ) -> (Arc<Session>, mpsc::Receiver<OutboundFrame>) {
        let (session, rx) = Session::new(session_id.clone(), Arc::clone(&self.defaults));
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::clone(&session));
        info!("session {session_id} registered");
        (session, rx)
    }

    /// Remove a session. Producers holding send handles observe a closed
    /// channel once the writer side is gone.
    pub async fn disconnect(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!("session {session_id} removed");
        }
        removed
    }

    /// Look up a session.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Look up a session, creating a virtual one (outbound drained to a
    /// discard task) when the ID is unknown. REST commands aimed at clients
    /// that never connected land here.
    pub async fn get_or_default(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.get(session_id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            return Arc::clone(session);
        }

        let (session, mut rx) = Session::new(session_id.to_owned(), Arc::clone(&self.defaults));
        let session = Arc::new(session);
        sessions.insert(session_id.to_owned(), Arc::clone(&session));
        debug!("virtual session {session_id} created");
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        session
    }

    /// Sessions currently in `mode`.
    pub async fn sessions_in_mode(&self, mode: BackendMode) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.mode() == mode)
            .cloned()
            .collect()
    }

    /// Best-effort delivery of `frame` to every session matching `mode`
    /// (`None` matches all). Returns how many sessions accepted the frame.
    pub async fn broadcast(&self, mode: Option<BackendMode>, frame: OutboundFrame) -> usize {
        let targets: Vec<Arc<Session>> = {
            self.sessions
                .read()
                .await
                .values()
                .filter(|s| mode.is_none_or(|m| s.mode() == m))
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for session in targets {
            if session.outbound().try_emit(frame.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::CharacterConfig;
    use crate::model::LiveModel;
    use crate::test_utils::{ScriptedAgent, ScriptedAsr, ScriptedTts};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(SessionContext {
            model: Arc::new(LiveModel::from_config(&CharacterConfig::default())),
            agent: Arc::new(ScriptedAgent::new(Vec::new())),
            tts: Arc::new(ScriptedTts::new()),
            asr: Arc::new(ScriptedAsr::new("")),
        }))
    }

    #[tokio::test]
    async fn connect_assigns_unique_ids() {
        let registry = registry();
        let (a, _rx_a) = registry.connect().await;
        let (b, _rx_b) = registry.connect().await;
        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn disconnect_removes_session() {
        let registry = registry();
        let (session, _rx) = registry.connect().await;
        let id = session.session_id().to_owned();

        assert!(registry.disconnect(&id).await);
        assert!(registry.get(&id).await.is_none());
        assert!(!registry.disconnect(&id).await);
    }

    #[tokio::test]
    async fn get_or_default_creates_virtual_session() {
        let registry = registry();
        assert!(registry.get("ghost").await.is_none());

        let session = registry.get_or_default("ghost").await;
        assert_eq!(session.session_id(), "ghost");
        assert!(registry.get("ghost").await.is_some());

        // The same session comes back on the next call.
        let again = registry.get_or_default("ghost").await;
        assert!(Arc::ptr_eq(&session, &again));
    }

    #[tokio::test]
    async fn virtual_session_discards_frames_without_blocking() {
        let registry = registry();
        let session = registry.get_or_default("ghost").await;
        for _ in 0..(crate::session::OUTBOUND_CAPACITY * 3) {
            session
                .outbound()
                .emit(OutboundFrame::FullText {
                    text: "into the void".to_owned(),
                })
                .await
                .expect("emit to virtual session");
        }
    }

    #[tokio::test]
    async fn broadcast_filters_by_mode() {
        let registry = registry();
        let (auto_session, mut auto_rx) = registry.register("auto".to_owned()).await;
        let (idle_session, mut idle_rx) = registry.register("idle".to_owned()).await;
        auto_session.set_mode(BackendMode::Autonomous);
        let _ = idle_session;

        let delivered = registry
            .broadcast(
                Some(BackendMode::Autonomous),
                OutboundFrame::AutonomousChat {
                    text: "hello".to_owned(),
                },
            )
            .await;
        assert_eq!(delivered, 1);
        assert!(matches!(
            auto_rx.try_recv(),
            Ok(OutboundFrame::AutonomousChat { .. })
        ));
        assert!(idle_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_all_reaches_every_session() {
        let registry = registry();
        let (_a, mut rx_a) = registry.register("a".to_owned()).await;
        let (_b, mut rx_b) = registry.register("b".to_owned()).await;

        let delivered = registry
            .broadcast(
                None,
                OutboundFrame::AutonomousChat {
                    text: "to everyone".to_owned(),
                },
            )
            .await;
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}
