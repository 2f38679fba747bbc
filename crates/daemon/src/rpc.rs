//! JSON-RPC 2.0 envelopes, error codes and method parameters.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use yapper_core::domain::date_range;
use yapper_core::model::{DateRange, TaskStatus};
use yapper_core::{DomainError, ReindexError, VaultError};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SERVER_ERROR: i32 = -32000;

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Application failure. `kind` is echoed as `data.kind`.
    #[error("{message}")]
    Server { kind: &'static str, message: String },
}

impl RpcError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Server { kind: "not_found", message: message.into() }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Internal(_) => INTERNAL_ERROR,
            Self::Server { .. } => SERVER_ERROR,
        }
    }

    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Server { kind, .. } => Some(json!({ "kind": kind })),
            _ => None,
        }
    }
}

impl From<VaultError> for RpcError {
    fn from(err: VaultError) -> Self {
        let message = err.to_string();
        match err {
            VaultError::NotFound(_) => Self::not_found(message),
            VaultError::InvalidPath { .. } => Self::InvalidParams(message),
            VaultError::MissingRoot(_) | VaultError::Walk { .. } | VaultError::Io { .. } => {
                Self::Server { kind: "io", message }
            }
        }
    }
}

impl From<DomainError> for RpcError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NoteNotFound(_) => Self::not_found(err.to_string()),
            DomainError::InvalidRange { .. } => Self::InvalidParams(err.to_string()),
            DomainError::Vault(inner) => inner.into(),
            DomainError::Reindex(ReindexError::Vault(inner)) => inner.into(),
            DomainError::Reindex(inner @ ReindexError::Note { .. }) => {
                Self::Server { kind: "reindex_aborted", message: inner.to_string() }
            }
            DomainError::Reindex(inner @ ReindexError::Cancelled { .. }) => {
                Self::Server { kind: "cancelled", message: inner.to_string() }
            }
        }
    }
}

/// Outgoing envelope. Field order is `jsonrpc`, `id`, then `result` or `error`.
#[derive(Debug, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn failure(id: Value, err: &RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ErrorBody { code: err.code(), message: err.to_string(), data: err.data() }),
        }
    }
}

/// A validated incoming call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// `None` when the `id` member is absent, which makes this a notification.
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

impl Request {
    /// Validate a decoded JSON value as a request envelope.
    ///
    /// On failure the returned id is the caller's id when one could be read.
    pub fn from_value(value: Value) -> Result<Self, (Value, RpcError)> {
        let Value::Object(mut obj) = value else {
            return Err((Value::Null, RpcError::InvalidRequest("expected a JSON object".into())));
        };

        let id = obj.remove("id");
        let reply_id = match &id {
            Some(v @ (Value::Null | Value::String(_) | Value::Number(_))) => v.clone(),
            Some(_) => {
                return Err((
                    Value::Null,
                    RpcError::InvalidRequest("id must be a string, number or null".into()),
                ));
            }
            None => Value::Null,
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err((reply_id, RpcError::InvalidRequest("jsonrpc field must be \"2.0\"".into())));
        }

        let method = match obj.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err((reply_id, RpcError::InvalidRequest("method must be a string".into())));
            }
            None => return Err((reply_id, RpcError::InvalidRequest("missing method".into()))),
        };

        Ok(Self { id, method, params: obj.remove("params") })
    }
}

pub fn to_json<T: Serialize>(value: T) -> RpcResult<Value> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.to_string()))
}

/// Decode params, treating absent or `null` as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> RpcResult<T> {
    let value = match params {
        None | Some(Value::Null) => json!({}),
        Some(v) => v,
    };
    serde_json::from_value(value).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

pub fn parse_date(input: &str) -> RpcResult<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| RpcError::InvalidParams(format!("invalid date '{input}', expected YYYY-MM-DD")))
}

/// Either a single value or an array of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(vs) => vs,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListTasksParams {
    pub status: Option<OneOrMany<String>>,
    pub tags: Option<Vec<String>>,
    pub text_search: Option<String>,
    pub touched_since: Option<String>,
}

impl ListTasksParams {
    pub fn statuses(&self) -> RpcResult<Vec<TaskStatus>> {
        let Some(status) = self.status.clone() else {
            return Ok(Vec::new());
        };
        status
            .into_vec()
            .iter()
            .map(|s| {
                TaskStatus::from_str(s)
                    .ok_or_else(|| RpcError::InvalidParams(format!("unknown status '{s}'")))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskDetailParams {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TagParams {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub start: String,
    pub end: String,
}

impl RangeParams {
    pub fn range(&self) -> RpcResult<DateRange> {
        let start = parse_date(&self.start)?;
        let end = parse_date(&self.end)?;
        Ok(date_range(start, end)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenDailyParams {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteParams {
    pub note_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteNoteParams {
    pub note_id: String,
    pub content: String,
}
