/// Wire model for calls and responses
///
/// This module defines the two message shapes exchanged between peers,
/// the correlation id that links them, and optional JSON framing.
pub mod codec;
mod correlation;
mod message;

pub(crate) use correlation::IdGenerator;
pub use correlation::CorrelationId;
pub use message::{Message, WrappedCall, WrappedResponse};
