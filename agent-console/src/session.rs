//! SessionActor - owns one conversation's session context
//!
//! Turns are processed one at a time in mailbox order: the agent call is
//! awaited inside the handler, so a second prompt waits until the first has
//! committed or failed. State changes only at turn boundaries:
//!
//! - a successful turn appends the prompt and the answer, and replaces the
//!   citations and trace wholesale
//! - a failed turn leaves the pre-turn state untouched
//! - reset swaps in a fresh context with a new session id

use std::sync::Arc;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{
    ChatMessage, Citation, CitationEntry, RawTraceBucket, SessionSnapshot, TraceView, TurnView,
};

use crate::agent_client::{AgentClientError, AgentInvoker, InvokeRequest};
use crate::normalizer::{normalize, NormalizeError};
use crate::trace::{group_trace, TraceLayout};
use crate::transcript::{assemble_turn, AssembledTurn};

// ============================================================================
// Session Context
// ============================================================================

/// Conversation state of one session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub citations: Vec<Citation>,
    pub trace: RawTraceBucket,
    citation_entries: Vec<CitationEntry>,
    trace_view: TraceView,
    show_transactions_panel: bool,
}

impl SessionState {
    pub fn new(layout: &TraceLayout) -> Self {
        let trace = RawTraceBucket::new();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            messages: Vec::new(),
            citations: Vec::new(),
            trace_view: group_trace(&trace, layout),
            trace,
            citation_entries: Vec::new(),
            show_transactions_panel: false,
        }
    }

    /// Apply a completed turn and return what the page renders for it.
    pub fn commit(&mut self, prompt: ChatMessage, turn: AssembledTurn) -> TurnView {
        self.messages.push(prompt);
        self.messages.push(turn.message.clone());
        self.citations = turn.citations;
        self.trace = turn.trace;
        self.citation_entries = turn.citation_entries;
        self.trace_view = turn.trace_view;
        self.show_transactions_panel = turn.show_transactions_panel;

        TurnView {
            session_id: self.session_id.clone(),
            message: turn.message,
            citations: self.citation_entries.clone(),
            trace: self.trace_view.clone(),
            show_transactions_panel: self.show_transactions_panel,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            messages: self.messages.clone(),
            citations: self.citation_entries.clone(),
            trace: self.trace_view.clone(),
            show_transactions_panel: self.show_transactions_panel,
        }
    }
}

/// Agent a session talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTarget {
    pub agent_id: Option<String>,
    pub agent_alias_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Prompt cannot be empty")]
    EmptyPrompt,

    #[error("Agent invocation failed: {0}")]
    Agent(#[from] AgentClientError),

    #[error("Malformed completion stream: {0}")]
    Normalize(#[from] NormalizeError),
}

/// Run one turn against `session` without mutating it.
pub async fn run_turn(
    session: &SessionState,
    invoker: &dyn AgentInvoker,
    target: &AgentTarget,
    layout: &TraceLayout,
    prompt: &str,
) -> Result<AssembledTurn, TurnError> {
    if prompt.trim().is_empty() {
        return Err(TurnError::EmptyPrompt);
    }

    let request = InvokeRequest {
        agent_id: target.agent_id.clone(),
        agent_alias_id: target.agent_alias_id.clone(),
        session_id: session.session_id.clone(),
        input_text: prompt.to_string(),
        enable_trace: true,
    };

    let events = invoker.invoke(&request).await?;
    let output = normalize(events)?;
    Ok(assemble_turn(output, layout))
}

// ============================================================================
// Actor
// ============================================================================

#[derive(Debug, Default)]
pub struct SessionActor;

/// Arguments for spawning SessionActor
#[derive(Clone)]
pub struct SessionArguments {
    pub chat_id: String,
    pub invoker: Arc<dyn AgentInvoker>,
    pub target: AgentTarget,
    pub layout: TraceLayout,
}

pub struct SessionActorState {
    chat_id: String,
    session: SessionState,
    invoker: Arc<dyn AgentInvoker>,
    target: AgentTarget,
    layout: TraceLayout,
}

/// Messages handled by SessionActor
#[derive(Debug)]
pub enum SessionMsg {
    /// Run a turn for a user prompt
    SendPrompt {
        text: String,
        reply: RpcReplyPort<Result<TurnView, TurnError>>,
    },
    /// Current transcript, citations and trace
    GetSnapshot {
        reply: RpcReplyPort<SessionSnapshot>,
    },
    /// Replace the session with a fresh one
    Reset {
        reply: RpcReplyPort<SessionSnapshot>,
    },
}

#[async_trait]
impl Actor for SessionActor {
    type Msg = SessionMsg;
    type State = SessionActorState;
    type Arguments = SessionArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let session = SessionState::new(&args.layout);
        tracing::info!(
            actor_id = %myself.get_id(),
            chat_id = %args.chat_id,
            session_id = %session.session_id,
            "SessionActor starting"
        );

        Ok(SessionActorState {
            chat_id: args.chat_id,
            session,
            invoker: args.invoker,
            target: args.target,
            layout: args.layout,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMsg::SendPrompt { text, reply } => {
                let result = self.handle_send_prompt(text, state).await;
                let _ = reply.send(result);
            }
            SessionMsg::GetSnapshot { reply } => {
                let _ = reply.send(state.session.snapshot());
            }
            SessionMsg::Reset { reply } => {
                let previous = std::mem::replace(
                    &mut state.session,
                    SessionState::new(&state.layout),
                );
                tracing::info!(
                    chat_id = %state.chat_id,
                    previous_session_id = %previous.session_id,
                    session_id = %state.session.session_id,
                    "Session reset"
                );
                let _ = reply.send(state.session.snapshot());
            }
        }
        Ok(())
    }
}

impl SessionActor {
    async fn handle_send_prompt(
        &self,
        text: String,
        state: &mut SessionActorState,
    ) -> Result<TurnView, TurnError> {
        tracing::info!(
            chat_id = %state.chat_id,
            session_id = %state.session.session_id,
            "Turn started"
        );

        match run_turn(
            &state.session,
            state.invoker.as_ref(),
            &state.target,
            &state.layout,
            &text,
        )
        .await
        {
            Ok(turn) => {
                let view = state.session.commit(ChatMessage::user(text), turn);
                tracing::info!(
                    chat_id = %state.chat_id,
                    session_id = %view.session_id,
                    citations = view.citations.len(),
                    trace_steps = view.trace.step_count(),
                    "Turn committed"
                );
                Ok(view)
            }
            Err(err) => {
                tracing::warn!(
                    chat_id = %state.chat_id,
                    session_id = %state.session.session_id,
                    error = %err,
                    "Turn failed; session left unchanged"
                );
                Err(err)
            }
        }
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Convenience function to run a turn
pub async fn send_prompt(
    session: &ActorRef<SessionMsg>,
    text: impl Into<String>,
) -> Result<Result<TurnView, TurnError>, ractor::RactorErr<SessionMsg>> {
    ractor::call!(session, |reply| SessionMsg::SendPrompt {
        text: text.into(),
        reply,
    })
}

/// Convenience function to read the session snapshot
pub async fn get_snapshot(
    session: &ActorRef<SessionMsg>,
) -> Result<SessionSnapshot, ractor::RactorErr<SessionMsg>> {
    ractor::call!(session, |reply| SessionMsg::GetSnapshot { reply })
}

/// Convenience function to reset the session
pub async fn reset_session(
    session: &ActorRef<SessionMsg>,
) -> Result<SessionSnapshot, ractor::RactorErr<SessionMsg>> {
    ractor::call!(session, |reply| SessionMsg::Reset { reply })
}

// ============================================================================
// Tests
// ============================================================================
