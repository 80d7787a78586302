//! JSON framing helpers for byte-oriented transports.
//!
//! The engine itself only deals in [`Message`] values. Hosts whose transport
//! moves bytes (sockets, pipes, queues) can use these to turn outbound
//! messages into frames and inbound frames back into something the consume
//! entry points understand.

use crate::protocol::Message;
use crate::Result;
use bytes::Bytes;
use serde_json::Value;

/// Encode a message as a JSON frame.
pub fn encode(message: &Message) -> Result<Bytes> {
    // ---
    let bytes = serde_json::to_vec(message)?;
    Ok(Bytes::from(bytes))
}

/// Decode a JSON frame into a raw value.
///
/// Classification is left to [`Message::classify`] so frames of other
/// protocols sharing the stream are not rejected here.
pub fn decode(frame: &[u8]) -> Result<Value> {
    // ---
    Ok(serde_json::from_slice(frame)?)
}
