use std::collections::HashMap;
use std::sync::Arc;

use ractor::{Actor, ActorRef, ActorStatus};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::agent_client::AgentInvoker;
use crate::session::{AgentTarget, SessionActor, SessionArguments, SessionMsg};
use crate::trace::TraceLayout;

/// Page header settings
#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub title: String,
    pub icon: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    invoker: Arc<dyn AgentInvoker>,
    target: AgentTarget,
    layout: TraceLayout,
    ui: UiConfig,
    sessions: Mutex<HashMap<String, ActorRef<SessionMsg>>>,
}

impl AppState {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        target: AgentTarget,
        layout: TraceLayout,
        ui: UiConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                invoker,
                target,
                layout,
                ui,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn ui(&self) -> &UiConfig {
        &self.inner.ui
    }

    /// Session actor of a conversation, spawned on first use. A stopped actor
    /// is replaced by a fresh session.
    pub async fn get_or_create_session(
        &self,
        chat_id: &str,
    ) -> Result<ActorRef<SessionMsg>, String> {
        let mut sessions = self.inner.sessions.lock().await;
        if let Some(existing) = sessions.get(chat_id) {
            if matches!(existing.get_status(), ActorStatus::Running) {
                return Ok(existing.clone());
            }
            tracing::warn!(chat_id, "Session actor not running; starting a new session");
        }

        let (session, _handle) = Actor::spawn(
            Some(format!("session:{chat_id}:{}", ulid::Ulid::new())),
            SessionActor,
            SessionArguments {
                chat_id: chat_id.to_string(),
                invoker: self.inner.invoker.clone(),
                target: self.inner.target.clone(),
                layout: self.inner.layout.clone(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;

        sessions.insert(chat_id.to_string(), session.clone());
        Ok(session)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Stop every session actor.
    pub async fn shutdown(&self) {
        let mut sessions = self.inner.sessions.lock().await;
        for (chat_id, session) in sessions.drain() {
            tracing::debug!(chat_id = %chat_id, "Stopping session actor");
            session.stop(None);
        }
    }
}
