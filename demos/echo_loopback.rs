//! Echo example over a single in-memory loopback channel.
//!
//! The channel's sender delivers straight back into its own inbox, so every
//! call it issues is dispatched against its own handlers.
//!
//! Run with: cargo run --example echo_loopback --features logging

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::panic_in_result_fn
)]

use anyrpc::{memory_loopback, ChannelConfig, Result, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i32,
    b: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let (channel, _task) = memory_loopback(ChannelConfig::default());

    channel.set_handler("echo", |payload: Value, _ctx| async move { Ok(payload) })?;

    channel.set_typed_handler("add", |req: AddRequest, _ctx| async move {
        // ---
        Ok(AddResponse { sum: req.a + req.b })
    })?;

    channel.set_handler("fail", |_payload: Value, _ctx| async move {
        // ---
        Err::<Value, _>(RpcError::handler("always fails"))
    })?;

    let reply = channel.call("echo", json!({"hello": "world"})).await?;
    println!("echo -> {reply}");

    let resp: AddResponse = channel.call_typed("add", AddRequest { a: 20, b: 3 }).await?;
    println!("20 + 3 = {}", resp.sum);

    match channel.call("fail", Value::Null).await {
        Ok(value) => println!("unexpected success: {value}"),
        Err(err) => println!("fail -> {err}"),
    }

    match channel.call("missing", Value::Null).await {
        Ok(value) => println!("unexpected success: {value}"),
        Err(err) => println!("missing -> {err}"),
    }

    Ok(())
}
