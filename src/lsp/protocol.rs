//! JSON-RPC 2.0 message model: classification of inbound bodies and
//! construction of outbound responses.

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    ServerNotInitialized = -32002,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerNotInitialized => "Server not initialized",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message body is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing or invalid 'jsonrpc' field")]
    BadJsonRpcField,

    #[error("Missing or invalid 'method' field")]
    BadMethodField,

    #[error("'id' field is neither a string nor an integer")]
    BadIdField,
}

/// A request/response correlation id: integer or string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageId {
    Int(i64),
    Str(String),
}

impl MessageId {
    pub fn to_value(&self) -> Value {
        match self {
            MessageId::Int(id) => json!(id),
            MessageId::Str(id) => json!(id),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if let Some(id) = value.as_i64() {
            return Some(MessageId::Int(id));
        }
        value.as_str().map(|id| MessageId::Str(id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub id: MessageId,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub method: String,
    pub params: Value,
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(RequestMessage),
    Notification(NotificationMessage),
    /// A response from the peer. Clients do not normally send these to a
    /// server; they are recognized so they can be ignored without tripping
    /// the failure counter.
    Response { id: Option<MessageId> },
}

impl Message {
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(request) => Some(&request.method),
            Message::Notification(notification) => Some(&notification.method),
            Message::Response { .. } => None,
        }
    }

    /// Classify a raw frame body per JSON-RPC 2.0.
    pub fn classify(body: &[u8]) -> Result<Message, ProtocolError> {
        let document: Value = serde_json::from_slice(body)?;

        if document.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            debug!("classify: missing or invalid 'jsonrpc' field");
            return Err(ProtocolError::BadJsonRpcField);
        }

        let method = document.get("method").and_then(Value::as_str);

        let Some(method) = method else {
            // No method: a response if it carries result/error with an id.
            if document.get("result").is_some() || document.get("error").is_some() {
                let id = document.get("id").and_then(MessageId::from_value);
                return Ok(Message::Response { id });
            }
            debug!("classify: missing 'method' field");
            return Err(ProtocolError::BadMethodField);
        };

        let params = document.get("params").cloned().unwrap_or(Value::Null);

        match document.get("id") {
            None => Ok(Message::Notification(NotificationMessage {
                method: method.to_string(),
                params,
            })),
            Some(id) => {
                let id = MessageId::from_value(id).ok_or_else(|| {
                    debug!("classify: 'id' field is not a string or integer");
                    ProtocolError::BadIdField
                })?;
                Ok(Message::Request(RequestMessage { id, method: method.to_string(), params }))
            }
        }
    }
}

/// An outbound response under construction. Starts as a null success result
/// for the request's id; handlers either fill in the result or set an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    id: MessageId,
    result: Value,
    error: Option<(i32, String)>,
}

impl ResponseMessage {
    pub fn for_request(request: &RequestMessage) -> Self {
        Self { id: request.id.clone(), result: Value::Null, error: None }
    }

    pub fn set_result(&mut self, result: Value) {
        self.result = result;
    }

    pub fn set_error(&mut self, code: ErrorCode) {
        self.error = Some((code.code(), code.default_message().to_string()));
    }

    pub fn set_error_with_message(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.error = Some((code.code(), message.into()));
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The final wire object.
    pub fn to_json(&self) -> Value {
        match &self.error {
            Some((code, message)) => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": self.id.to_value(),
                "error": { "code": code, "message": message },
            }),
            None => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": self.id.to_value(),
                "result": self.result,
            }),
        }
    }
}

/// A `$/logTrace` notification body.
pub fn log_trace_notification(message: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": "$/logTrace",
        "params": { "message": message },
    })
}
