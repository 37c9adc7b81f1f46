//! Action-group invocation handling
//!
//! The agent calls with an envelope naming the action group, API path and
//! method; the answer mirrors those back with a status and a JSON body
//! carried as text. A caller without both `agent` and `actionGroup` is a
//! direct test call and gets the simplified shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::store::{StoreError, TableStore};

pub const MESSAGE_VERSION: &str = "1.0";
pub const NO_DATA_ERROR: &str = "No transactions data found in the database.";
pub const DIRECT_SUCCESS_MESSAGE: &str = "Successfully retrieved transactions data";

/// Incoming envelope. Every member is optional; unknown members (parameters,
/// input text, ...) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    #[serde(default)]
    pub agent: Option<Value>,
    #[serde(default)]
    pub action_group: Option<String>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub session_attributes: Option<Value>,
    #[serde(default)]
    pub prompt_session_attributes: Option<Value>,
}

impl ActionEvent {
    /// Lenient parse; anything that is not an envelope counts as a direct call.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Unrecognised action envelope; treating as direct call");
                Self::default()
            }
        }
    }

    pub fn is_agent_call(&self) -> bool {
        self.agent.is_some() && self.action_group.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub message_version: String,
    pub response: ApiResponse,
    pub session_attributes: Value,
    pub prompt_session_attributes: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    pub http_status_code: u16,
    pub response_body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "application/json")]
    pub application_json: JsonBody,
}

/// Body document serialized as JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBody {
    pub body: String,
}

impl ResponseBody {
    fn json(body: &Value) -> Self {
        Self {
            application_json: JsonBody {
                body: body.to_string(),
            },
        }
    }
}

impl ActionResponse {
    /// Body text parsed back into JSON
    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.response.response_body.application_json.body)
    }
}

fn attributes(value: &Option<Value>) -> Value {
    value
        .clone()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Echo the caller's routing fields around `status` and `body`.
fn echoed(event: &ActionEvent, status: u16, body: &Value) -> ActionResponse {
    ActionResponse {
        message_version: MESSAGE_VERSION.to_string(),
        response: ApiResponse {
            action_group: event.action_group.clone().unwrap_or_default(),
            api_path: event.api_path.clone().unwrap_or_default(),
            http_method: event.http_method.clone().unwrap_or_default(),
            http_status_code: status,
            response_body: ResponseBody::json(body),
        },
        session_attributes: attributes(&event.session_attributes),
        prompt_session_attributes: attributes(&event.prompt_session_attributes),
    }
}

/// Build the response document for `event` given the scanned records.
pub fn build_response(event: &ActionEvent, records: Vec<Value>) -> ActionResponse {
    if records.is_empty() {
        return echoed(event, 404, &json!({ "error": NO_DATA_ERROR }));
    }

    if event.is_agent_call() {
        return echoed(event, 200, &Value::Array(records));
    }

    let count = records.len();
    let body = json!({
        "message": DIRECT_SUCCESS_MESSAGE,
        "data": records,
        "count": count
    });
    ActionResponse {
        message_version: MESSAGE_VERSION.to_string(),
        response: ApiResponse {
            action_group: String::new(),
            api_path: String::new(),
            http_method: String::new(),
            http_status_code: 200,
            response_body: ResponseBody::json(&body),
        },
        session_attributes: Value::Object(Map::new()),
        prompt_session_attributes: Value::Object(Map::new()),
    }
}

/// Scan `table` and answer the invocation.
pub async fn handle_invocation(
    store: &dyn TableStore,
    table: &str,
    event: &ActionEvent,
) -> Result<ActionResponse, StoreError> {
    let records = store.scan(table).await?;

    if records.is_empty() {
        tracing::warn!(table, "No items found; answering 404");
    } else {
        tracing::info!(
            table,
            count = records.len(),
            agent_call = event.is_agent_call(),
            "Returning transactions"
        );
    }

    Ok(build_response(event, records))
}
