//! Transport-agnostic call/response correlation for any one-way message pipe
//!
//! This library turns a plain "send a message" primitive (socket, worker
//! channel, queue, pipe) into a two-way RPC endpoint. It handles correlation
//! id assignment, response matching, timeouts, dispatch of inbound calls to
//! registered handlers, sub-channels sharing one handler table, and
//! forwarding calls between channels.
//!
//! The transport stays outside: a [`Channel`] sends through the [`Sender`]
//! it was built with, and the host feeds inbound messages to
//! [`Channel::consume`] (or one of its siblings).
//!
//! ```no_run
//! use anyrpc::{memory_loopback, ChannelConfig};
//! use serde_json::{json, Value};
//!
//! # async fn example() -> anyrpc::Result<()> {
//! let (channel, _task) = memory_loopback(ChannelConfig::default());
//! channel.set_handler("echo", |payload: Value, _ctx| async move { Ok(payload) })?;
//!
//! let reply = channel.call("echo", json!("hi")).await?;
//! assert_eq!(reply, json!("hi"));
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;

mod client;
mod domain;
mod server;
mod transport;

mod channel;
mod channel_builder;
mod channel_config;
mod channel_role;

mod error;
pub mod protocol;

#[allow(unused_imports)]
pub(crate) use macros::{log_debug, log_error, log_trace, log_warn};

// Re-export main types
pub use channel::{Channel, WeakChannel};
pub use channel_builder::ChannelBuilder;
pub use channel_config::{ChannelConfig, IdPolicy, DEFAULT_CALL_TIMEOUT};
pub use channel_role::ChannelRole;

pub use error::{Result, RpcError, METHOD_NOT_FOUND};

pub use protocol::{CorrelationId, Message, WrappedCall, WrappedResponse};

pub use server::{BoxFuture, CallContext, Consumed, DispatchOutcome};

pub use transport::{
    //
    memory_link,
    memory_loopback,
    memory_pair,
    spawn_inbound,
    MemoryPair,
    DEFAULT_CAPACITY,
};

// --- public re-exports
pub use domain::{
    //
    sender_fn,
    FnSender,
    Sender,
    SenderPtr,
};
