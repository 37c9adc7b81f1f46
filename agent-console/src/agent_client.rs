//! Agent invocation client
//!
//! The hosted agent service is a black box that, per prompt, yields a fully
//! drained completion stream or fails. `AgentInvoker` is that boundary; the
//! console normalizes the returned raw stream itself.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shared_types::{RawStreamEvent, StreamEvent};

/// One invocation of the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
    pub enable_trace: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentClientError {
    #[error("Agent id is not configured (set BEDROCK_AGENT_ID)")]
    MissingAgentId,

    #[error("Agent transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Agent service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Undecodable completion stream: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Completion is neither an event array nor an object with a `completion` array")]
    UnexpectedShape,

    #[error("Undecodable completion event {index}: {source}")]
    DecodeEvent {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read fixture {path}: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scripted failure: {0}")]
    Scripted(String),
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke the agent and return its completion stream in delivery order.
    async fn invoke(&self, request: &InvokeRequest) -> Result<Vec<StreamEvent>, AgentClientError>;
}

/// Decode a recorded or relayed completion: either a bare array of raw events
/// or an object with a `completion` array.
pub fn decode_completion(bytes: &[u8]) -> Result<Vec<StreamEvent>, AgentClientError> {
    let raw = match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(events) => events,
        Value::Object(mut body) => match body.remove("completion") {
            Some(Value::Array(events)) => events,
            _ => return Err(AgentClientError::UnexpectedShape),
        },
        _ => return Err(AgentClientError::UnexpectedShape),
    };

    let mut events = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        let event: RawStreamEvent = serde_json::from_value(value)
            .map_err(|source| AgentClientError::DecodeEvent { index, source })?;
        events.extend(event.into_events());
    }
    Ok(events)
}

// ============================================================================
// Gateway client
// ============================================================================

#[derive(Serialize)]
struct GatewayRequest<'a> {
    #[serde(flatten)]
    request: &'a InvokeRequest,
    region: &'a str,
}

/// Relays invocations through an HTTP gateway that signs and drains the
/// service's event stream, answering with the events as JSON.
pub struct GatewayAgentClient {
    client: reqwest::Client,
    endpoint: String,
    region: String,
}

impl GatewayAgentClient {
    pub fn new(endpoint: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl AgentInvoker for GatewayAgentClient {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Vec<StreamEvent>, AgentClientError> {
        let Some(agent_id) = request.agent_id.as_deref() else {
            return Err(AgentClientError::MissingAgentId);
        };

        tracing::info!(
            agent_id,
            agent_alias_id = %request.agent_alias_id,
            session_id = %request.session_id,
            "Invoking agent"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GatewayRequest {
                request,
                region: &self.region,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(AgentClientError::Service {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        decode_completion(&body)
    }
}

// ============================================================================
// Fixture client
// ============================================================================

/// Replays a recorded completion from disk for every prompt.
pub struct FixtureAgentClient {
    path: PathBuf,
}

impl FixtureAgentClient {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl AgentInvoker for FixtureAgentClient {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Vec<StreamEvent>, AgentClientError> {
        tracing::info!(
            path = %self.path.display(),
            session_id = %request.session_id,
            "Replaying recorded completion"
        );
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| AgentClientError::Fixture {
                path: self.path.clone(),
                source,
            })?;
        decode_completion(&bytes)
    }
}

// ============================================================================
// Scripted client
// ============================================================================

/// Answers from a queue of prepared completions; records every request.
#[derive(Default)]
pub struct ScriptedAgentClient {
    responses: Mutex<VecDeque<Result<Vec<StreamEvent>, String>>>,
    requests: Mutex<Vec<InvokeRequest>>,
}

impl ScriptedAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(self, events: Vec<StreamEvent>) -> Self {
        self.push(Ok(events));
        self
    }

    pub fn fail_with(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, response: Result<Vec<StreamEvent>, String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }

    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedAgentClient {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Vec<StreamEvent>, AgentClientError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());
        match next {
            Some(Ok(events)) => Ok(events),
            Some(Err(message)) => Err(AgentClientError::Scripted(message)),
            None => Err(AgentClientError::Scripted(
                "no scripted completion left".to_string(),
            )),
        }
    }
}
