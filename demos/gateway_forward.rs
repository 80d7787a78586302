//! Forwarding example: a gateway relays calls to a backend.
//!
//! Three channels are wired through in-memory links:
//!
//! ```text
//!   client <-> gateway_front    gateway_back <-> backend
//! ```
//!
//! `gateway_front` forwards "lookup" to `gateway_back`, which issues the call
//! to the backend and relays the response (or failure) to the client.
//!
//! Run with: cargo run --example gateway_forward --features logging

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::panic_in_result_fn
)]

use std::time::Duration;

use anyrpc::{memory_pair, ChannelConfig, Result, RpcError};
use serde_json::{json, Value};
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let front = memory_pair(ChannelConfig::default(), ChannelConfig::default());
    let back = memory_pair(ChannelConfig::default(), ChannelConfig::default());

    let client = &front.left;
    let gateway_front = &front.right;
    let gateway_back = &back.left;
    let backend = &back.right;

    backend.set_handler("lookup", |payload: Value, _ctx| async move {
        // ---
        match payload.get("key").and_then(Value::as_str) {
            Some("alpha") => Ok(json!({"value": 1})),
            Some("beta") => Ok(json!({"value": 2})),
            _ => Err(RpcError::handler("unknown key")),
        }
    })?;

    gateway_front.set_forward(gateway_back, "lookup", Duration::from_secs(1))?;

    for key in ["alpha", "beta", "gamma"] {
        match client.call("lookup", json!({"key": key})).await {
            Ok(value) => println!("{key} -> {value}"),
            Err(err) => println!("{key} -> {err}"),
        }
    }

    Ok(())
}
