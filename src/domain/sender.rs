// src/domain/sender.rs

//! Outbound transport abstraction.
//!
//! A channel never moves bytes itself. It hands every outbound message
//! (calls it issues, responses it produces) to a [`Sender`] supplied at
//! construction and awaits it before considering the message sent.
//!
//! How the message reaches the peer, and how the peer's messages come back
//! into the engine, is the host's business: inbound delivery is purely
//! reactive through the channel's consume entry points.

use crate::protocol::Message;
use crate::Result;
use std::future::Future;
use std::sync::Arc;

/// One-way message sink toward the peer.
///
/// A returned error fails the specific call that was sending (or the
/// dispatch that was replying) and nothing else.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat `send` as a normal
/// `async fn`.
#[async_trait::async_trait]
pub trait Sender: Send + Sync {
    // ---
    /// Deliver one message toward the peer.
    async fn send(&self, message: Message) -> Result<()>;
}

/// Shared sender pointer.
///
/// Cloning is cheap; every clone refers to the same underlying sink.
pub type SenderPtr = Arc<dyn Sender>;

/// Adapter turning an async closure into a [`Sender`].
pub struct FnSender<F> {
    func: F,
}

#[async_trait::async_trait]
impl<F, Fut> Sender for FnSender<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn send(&self, message: Message) -> Result<()> {
        (self.func)(message).await
    }
}

/// Build a [`SenderPtr`] from an async closure.
///
/// ```
/// # use anyrpc::{sender_fn, Message};
/// let sender = sender_fn(|msg: Message| async move {
///     println!("outbound: {msg:?}");
///     Ok(())
/// });
/// ```
pub fn sender_fn<F, Fut>(func: F) -> SenderPtr
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    // ---
    Arc::new(FnSender { func })
}
