/// Inbound side of a channel: handler table and call dispatch
mod handler;
mod registry;

pub use handler::{BoxFuture, CallContext};
pub(crate) use handler::{HandlerFn, RawHandler, TypedHandler};
pub(crate) use registry::{HandlerRegistry, RegistryPtr};

use crate::protocol::{Message, WrappedCall, WrappedResponse};
use crate::{Result, RpcError, SenderPtr};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;

/// How an inbound call ended once fully dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A response was sent back; `success` mirrors its flag.
    Responded { success: bool },

    /// The call used the fire-and-forget id; nothing was sent back.
    FireAndForget,

    /// No handler matched and unhandled calls are ignored; nothing was sent.
    Unhandled,
}

/// Result of offering an inbound message to a channel.
///
/// Lets several independent consumers share one inbound stream: a message
/// the channel does not recognize comes back as [`Consumed::NotRecognized`]
/// and can be handed to the next consumer.
pub enum Consumed {
    /// Neither a call nor a response.
    NotRecognized,

    /// A response, handled synchronously. `true` if it completed a pending
    /// call; `false` if no call with that id was pending (late, duplicate or
    /// foreign response).
    Handled(bool),

    /// A call; completes once the handler has run and any response has been
    /// sent.
    Dispatching(BoxFuture<'static, Result<DispatchOutcome>>),
}

impl Consumed {
    // ---

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Consumed::NotRecognized)
    }

    /// Drive a call dispatch to completion.
    ///
    /// Returns `None` for anything that was not a call.
    pub async fn wait(self) -> Result<Option<DispatchOutcome>> {
        // ---
        match self {
            Consumed::Dispatching(fut) => fut.await.map(Some),
            Consumed::NotRecognized | Consumed::Handled(_) => Ok(None),
        }
    }
}

impl fmt::Debug for Consumed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumed::NotRecognized => f.write_str("NotRecognized"),
            Consumed::Handled(matched) => f.debug_tuple("Handled").field(matched).finish(),
            Consumed::Dispatching(_) => f.write_str("Dispatching(..)"),
        }
    }
}

/// Run one inbound call against the registry and send back its response.
///
/// Handler failures never escape: errors and panics alike become
/// `success=false` responses. The only error this returns is a failure of
/// `reply` itself.
pub(crate) async fn dispatch_call(
    registry: RegistryPtr,
    ignore_unhandled: bool,
    call: WrappedCall,
    reply: SenderPtr,
) -> Result<DispatchOutcome> {
    // ---
    let WrappedCall {
        correlation_id,
        method,
        payload,
        aux_data,
    } = call;
    let fire_and_forget = correlation_id.is_fire_and_forget();

    let response = match registry.get(&method) {
        Some(handler) => {
            let ctx = CallContext {
                correlation_id,
                aux_data,
                fire_and_forget,
            };

            // Handler construction runs inside the guarded future too
            let outcome = AssertUnwindSafe(async move { handler.call(payload, ctx).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(RpcError::handler(panic_message(panic.as_ref()))));

            match outcome {
                Ok(value) => WrappedResponse::success(correlation_id, value),
                Err(err) => {
                    crate::log_debug!("handler for {method} failed: {err}");
                    WrappedResponse::failure(correlation_id, err.into_payload())
                }
            }
        }
        None if ignore_unhandled => {
            crate::log_debug!("ignoring call to unhandled method: {method}");
            return Ok(DispatchOutcome::Unhandled);
        }
        None => {
            crate::log_warn!("no handler for method: {method}");
            let err = RpcError::MethodNotFound(method.clone());
            WrappedResponse::failure(correlation_id, err.into_payload())
        }
    };

    if fire_and_forget {
        return Ok(DispatchOutcome::FireAndForget);
    }

    let success = response.success;
    if let Err(e) = reply.send(Message::Response(response)).await {
        crate::log_error!("failed to send response for {method}: {e}");
        return Err(e);
    }

    Ok(DispatchOutcome::Responded { success })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    // ---
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
