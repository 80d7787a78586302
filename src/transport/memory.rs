//! In-memory transport implementation.
//!
//! This module provides a pure in-process transport for channels: an
//! mpsc-backed [`Sender`] plus a receive loop that feeds a channel's inbox
//! into its consume entry point. It is intended primarily for testing, local
//! execution, and as a reference for how a host wires a real transport.
//!
//! ## Reference Semantics
//!
//! - Messages are delivered in send order.
//! - No messages are dropped while both ends are alive.
//! - Inbound calls are dispatched on their own task, so a slow handler does
//!   not hold up responses arriving behind it. Responses are completed
//!   inline on the receive loop.
//!
//! ## Non-Goals
//!
//! This transport does not emulate the failure modes or delivery guarantees
//! of any real link.

use crate::{
    // ---
    log_debug,
    log_warn,
    Channel,
    ChannelConfig,
    Consumed,
    Message,
    Result,
    RpcError,
    Sender,
    SenderPtr,
    WeakChannel,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Inbox depth used by [`memory_link`] callers that don't care.
pub const DEFAULT_CAPACITY: usize = 64;

/// Sending half of an in-memory link.
struct MemorySender {
    // ---
    tx: mpsc::Sender<Message>,
}

#[async_trait::async_trait]
impl Sender for MemorySender {
    // ---

    /// Queue the message on the peer's inbox.
    ///
    /// Fails with [`RpcError::Send`] once the receiving side is gone.
    async fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| RpcError::Send("memory link closed".into()))
    }
}

/// Create one direction of an in-memory link.
///
/// Whatever is sent through the returned sender comes out of the returned
/// receiver, in order.
pub fn memory_link(capacity: usize) -> (SenderPtr, mpsc::Receiver<Message>) {
    // ---
    let (tx, rx) = mpsc::channel(capacity);
    (Arc::new(MemorySender { tx }), rx)
}

/// Feed an inbox into a channel until the inbox closes or the channel is
/// dropped.
///
/// Only a weak handle to the channel is kept, so the loop does not keep the
/// channel (and the sender it owns) alive by itself. Dispatch errors are
/// logged and do not stop the loop.
pub fn spawn_inbound(channel: &Channel, mut inbox: mpsc::Receiver<Message>) -> JoinHandle<()> {
    // ---
    let channel: WeakChannel = channel.downgrade();

    tokio::spawn(async move {
        log_debug!("inbound loop started");

        while let Some(message) = inbox.recv().await {
            let Some(channel) = channel.upgrade() else {
                break;
            };

            match channel.consume(message) {
                Consumed::Dispatching(fut) => {
                    tokio::spawn(async move {
                        if let Err(_err) = fut.await {
                            log_warn!("inbound dispatch failed: {_err}");
                        }
                    });
                }
                Consumed::Handled(_matched) => {}
                Consumed::NotRecognized => {
                    log_debug!("dropping unrecognized inbound message");
                }
            }
        }

        log_debug!("inbound loop stopped");
    })
}

/// Two root channels wired to each other through in-memory links.
///
/// Each channel's sender feeds the other's inbox, and both receive loops are
/// running. Dropping both channels shuts the loops down.
pub struct MemoryPair {
    pub left: Channel,
    pub right: Channel,
    pub tasks: [JoinHandle<()>; 2],
}

/// Build a connected [`MemoryPair`].
///
/// Must be called from within a tokio runtime.
pub fn memory_pair(left: ChannelConfig, right: ChannelConfig) -> MemoryPair {
    // ---
    let (to_right, right_inbox) = memory_link(DEFAULT_CAPACITY);
    let (to_left, left_inbox) = memory_link(DEFAULT_CAPACITY);

    let left = Channel::with_config(to_right, left);
    let right = Channel::with_config(to_left, right);

    let tasks = [
        spawn_inbound(&left, left_inbox),
        spawn_inbound(&right, right_inbox),
    ];

    MemoryPair { left, right, tasks }
}

/// A root channel whose sender delivers straight back into itself.
///
/// Calls issued on it are dispatched against its own handlers.
pub fn memory_loopback(config: ChannelConfig) -> (Channel, JoinHandle<()>) {
    // ---
    let (sender, inbox) = memory_link(DEFAULT_CAPACITY);
    let channel = Channel::with_config(sender, config);
    let task = spawn_inbound(&channel, inbox);
    (channel, task)
}
