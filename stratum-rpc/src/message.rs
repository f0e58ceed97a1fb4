//! Stratum wire messages and the engine-facing call model.
//!
//! Stratum speaks a pre-2.0 dialect of JSON-RPC: no `jsonrpc` version field,
//! notifications carry `"id": null`, and errors come either as a bare string
//! or as a `[code, message, data]` array. Inbound frames are decoded into the
//! loose [`WireMessage`] shape and classified afterwards, since a single
//! connection carries requests, responses and notifications interleaved in
//! both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::{StratumRpcError, StratumRpcResult};

/// Text surfaced to the engine when the peer sent an error with no message.
pub const UNSPECIFIED_ERROR: &str = "unspecified error";

/// Sequence number the engine uses for calls that expect no reply.
pub const NOTIFICATION_SEQ: u64 = 0;

/// Call header handed to or received from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method name (e.g., "mining.subscribe")
    pub method: String,

    /// Engine correlation handle; [`NOTIFICATION_SEQ`] for notifications
    pub seq: u64,
}

impl Request {
    /// Create a request expecting a reply.
    pub fn new(method: impl Into<String>, seq: u64) -> Self {
        Self {
            method: method.into(),
            seq,
        }
    }

    /// Create a notification (no reply expected).
    pub fn notification(method: impl Into<String>) -> Self {
        Self::new(method, NOTIFICATION_SEQ)
    }

    /// Check if this is a notification.
    pub fn is_notification(&self) -> bool {
        self.seq == NOTIFICATION_SEQ
    }
}

/// Reply header handed to or received from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Sequence number of the call being answered
    pub seq: u64,

    /// Error text; `None` on success. Never `Some("")` when read off the wire.
    pub error: Option<String>,
}

impl Response {
    /// Successful reply to `seq`.
    pub fn ok(seq: u64) -> Self {
        Self { seq, error: None }
    }

    /// Failed reply to `seq`.
    pub fn err(seq: u64, error: impl Into<String>) -> Self {
        Self {
            seq,
            error: Some(error.into()),
        }
    }
}

/// Classified header of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// Call or notification from the peer
    Request(Request),

    /// Reply from the peer to one of our calls
    Response(Response),
}

/// Union of every field an inbound frame may carry.
///
/// `params`, `id` and `result` stay as raw JSON text until the engine says
/// what type it wants, so they are decoded exactly once. JSON `null` and a
/// missing field both land as `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Box<RawValue>>,
    #[serde(default)]
    pub id: Option<Box<RawValue>>,
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl WireMessage {
    /// A frame is a request iff it names a method.
    pub fn is_request(&self) -> bool {
        self.method.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// The `error` field of a response, in either shape pools send it.
#[derive(Debug, Clone, PartialEq)]
pub enum WireError {
    /// No error (field absent or null)
    Empty,

    /// Bare string error
    Text(String),

    /// Mining-style `[code, message, data?]` array
    Structured {
        code: Value,
        message: String,
        data: Option<Value>,
    },
}

impl WireError {
    /// Decode the raw `error` field, trying the string shape first and the
    /// array shape second.
    pub fn decode(raw: Option<Value>) -> StratumRpcResult<Self> {
        match raw {
            None | Some(Value::Null) => Ok(WireError::Empty),
            Some(Value::String(text)) => Ok(WireError::Text(text)),
            Some(other) => {
                if let Value::Array(items) = &other {
                    if let [code, Value::String(message), rest @ ..] = items.as_slice() {
                        return Ok(WireError::Structured {
                            code: code.clone(),
                            message: message.clone(),
                            data: rest.first().cloned(),
                        });
                    }
                }
                Err(StratumRpcError::InvalidError(other))
            }
        }
    }

    /// Human-readable text for the engine, `None` if there was no error.
    pub fn into_message(self) -> Option<String> {
        let text = match self {
            WireError::Empty => return None,
            WireError::Text(text) => text,
            WireError::Structured { message, .. } => message,
        };

        if text.is_empty() {
            Some(UNSPECIFIED_ERROR.to_string())
        } else {
            Some(text)
        }
    }
}

/// Outbound call or notification.
#[derive(Debug, Serialize)]
pub(crate) struct OutgoingCall<'a> {
    pub method: &'a str,
    pub params: Value,
    pub id: Option<u64>,
}

/// Outbound reply; `id` is the peer's original id, byte for byte.
#[derive(Debug, Serialize)]
pub(crate) struct OutgoingResponse<'a> {
    pub id: &'a RawValue,
    pub result: Value,
    pub error: Value,
}

/// Normalize a parameter value into the positional list Stratum expects.
///
/// Arrays go out as-is, unit/`null` becomes `[]`, anything else is wrapped
/// as the sole element.
pub(crate) fn positional(params: Value) -> Value {
    match params {
        Value::Array(_) => params,
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    }
}

/// Encode the engine's error text for the wire.
///
/// Handlers that already produced the structured `[code, message, data]`
/// form get it re-emitted verbatim; any other text goes out as a string.
pub(crate) fn error_to_wire(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(array @ Value::Array(_)) => array,
        _ => Value::String(text.to_string()),
    }
}
