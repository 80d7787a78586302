use crate::protocol::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outbound or inbound invocation of a named method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedCall {
    pub correlation_id: CorrelationId,
    pub method: String,
    #[serde(default)]
    pub payload: Value,

    /// Host-supplied data handed to the handler alongside the payload
    /// (a session object, a peer address, ...). Attached at local dispatch
    /// time; never set on calls issued by a channel and never forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<Value>,
}

impl WrappedCall {
    // ---

    pub fn new(correlation_id: CorrelationId, method: impl Into<String>, payload: Value) -> Self {
        // ---
        Self {
            correlation_id,
            method: method.into(),
            payload,
            aux_data: None,
        }
    }

    /// Attach auxiliary data for local dispatch.
    pub fn with_aux_data(mut self, aux_data: Value) -> Self {
        self.aux_data = Some(aux_data);
        self
    }

    pub fn is_fire_and_forget(&self) -> bool {
        self.correlation_id.is_fire_and_forget()
    }
}

/// The answer to a [`WrappedCall`], matched by correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedResponse {
    pub correlation_id: CorrelationId,
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
}

impl WrappedResponse {
    // ---

    pub fn success(correlation_id: CorrelationId, payload: Value) -> Self {
        // ---
        Self {
            correlation_id,
            success: true,
            payload,
        }
    }

    pub fn failure(correlation_id: CorrelationId, payload: Value) -> Self {
        // ---
        Self {
            correlation_id,
            success: false,
            payload,
        }
    }
}

/// Either wire shape. This is what a [`Sender`](crate::Sender) is handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Call(WrappedCall),
    Response(WrappedResponse),
}

impl Message {
    // ---

    pub fn correlation_id(&self) -> CorrelationId {
        // ---
        match self {
            Message::Call(call) => call.correlation_id,
            Message::Response(response) => response.correlation_id,
        }
    }

    /// Classify a raw JSON message.
    ///
    /// An object with a non-empty `method` is a call; an object with a
    /// non-null `success` is a response. Anything else, including an object
    /// that looks like one of the two but fails to decode, yields `None` so
    /// the caller can offer the message to another consumer.
    pub fn classify(raw: &Value) -> Option<Message> {
        // ---
        let obj = raw.as_object()?;

        let has_method = obj
            .get("method")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.is_empty());

        if has_method {
            return serde_json::from_value(raw.clone()).ok().map(Message::Call);
        }

        if obj.get("success").is_some_and(|s| !s.is_null()) {
            return serde_json::from_value(raw.clone())
                .ok()
                .map(Message::Response);
        }

        None
    }
}

impl From<WrappedCall> for Message {
    fn from(call: WrappedCall) -> Self {
        Message::Call(call)
    }
}

impl From<WrappedResponse> for Message {
    fn from(response: WrappedResponse) -> Self {
        Message::Response(response)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_wire_shape() {
        // ---
        let call = WrappedCall::new(CorrelationId::new(3), "echo", json!("hi"));
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(
            value,
            json!({"correlationId": 3, "method": "echo", "payload": "hi"})
        );
    }

    #[test]
    fn test_response_wire_shape() {
        // ---
        let response = WrappedResponse::failure(CorrelationId::new(9), json!("nope"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"correlationId": 9, "success": false, "payload": "nope"})
        );
    }

    #[test]
    fn test_classify_call_and_response() {
        // ---
        let call = json!({"correlationId": 1, "method": "add", "payload": [1, 2], "auxData": "s"});
        match Message::classify(&call) {
            Some(Message::Call(c)) => {
                assert_eq!(c.method, "add");
                assert_eq!(c.aux_data, Some(json!("s")));
            }
            other => panic!("expected call, got {other:?}"),
        }

        let response = json!({"correlationId": 1, "success": true, "payload": 3});
        assert!(matches!(
            Message::classify(&response),
            Some(Message::Response(WrappedResponse { success: true, .. }))
        ));
    }

    #[test]
    fn test_classify_rejects_foreign_messages() {
        // ---
        assert!(Message::classify(&json!({"kind": "heartbeat"})).is_none());
        assert!(Message::classify(&json!({"correlationId": 1, "method": ""})).is_none());
        assert!(Message::classify(&json!({"correlationId": 1, "success": null})).is_none());
        assert!(Message::classify(&json!("just a string")).is_none());
    }

    #[test]
    fn test_untagged_decode() {
        // ---
        let msg: Message =
            serde_json::from_str(r#"{"correlationId":-1,"method":"ping","payload":null}"#).unwrap();
        assert!(matches!(msg, Message::Call(ref c) if c.is_fire_and_forget()));
        assert_eq!(msg.correlation_id(), CorrelationId::FIRE_AND_FORGET);
    }
}
