use serde_json::Value;
use thiserror::Error;

/// Payload carried by the failure response for an unregistered method.
pub const METHOD_NOT_FOUND: &str = "Method not found";

/// Errors that can occur while issuing, dispatching or registering calls.
#[derive(Error, Debug)]
pub enum RpcError {
    /// No response arrived before the call's timeout elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The remote handler failed; carries the payload of the failure response.
    #[error("remote error: {}", display_payload(.0))]
    Remote(Value),

    /// Inbound call named a method with no registered handler.
    ///
    /// Displays as the exact payload sent back to the peer.
    #[error("Method not found")]
    MethodNotFound(String),

    /// A handler is already registered for this method and override is disabled.
    #[error("handler already registered for method: {0}")]
    DuplicateHandler(String),

    /// Handler registration attempted on a sub-channel.
    #[error("cannot register handler for {0} on a sub-channel")]
    ChannelRole(String),

    /// The transport sender rejected the message.
    #[error("send failed: {0}")]
    Send(String),

    /// Failure raised by a local handler. The message becomes the response payload.
    #[error("{0}")]
    Handler(String),

    /// The channel was closed while the call was pending.
    #[error("channel closed")]
    ChannelClosed,

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RpcError {
    /// Build a handler failure from any displayable message.
    pub fn handler(msg: impl Into<String>) -> Self {
        // ---
        Self::Handler(msg.into())
    }

    /// Convert into the payload of a `success=false` response.
    ///
    /// Remote payloads are relayed untouched so forwarded failures reach the
    /// original caller exactly as the far handler produced them.
    pub fn into_payload(self) -> Value {
        // ---
        match self {
            Self::Remote(payload) => payload,
            other => Value::String(other.to_string()),
        }
    }

    /// The remote failure message, when the payload is a plain string.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Remote(Value::String(msg)) => Some(msg),
            _ => None,
        }
    }

    /// True if the peer answered that the method has no handler.
    pub fn is_method_not_found(&self) -> bool {
        // ---
        matches!(self, Self::MethodNotFound(_)) || self.remote_message() == Some(METHOD_NOT_FOUND)
    }
}

fn display_payload(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
