/// Outbound side of a channel: issuing calls and matching their responses
mod pending;

use crate::protocol::{CorrelationId, IdGenerator, Message, WrappedCall, WrappedResponse};
use crate::{Result, RpcError, SenderPtr};
use pending::{CorrelationTable, PendingGuard};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Issues calls over one sender and owns their correlation table.
///
/// Every channel, root or sub, has its own issuer; nothing here is shared
/// between channels.
pub(crate) struct CallIssuer {
    // ---
    sender: SenderPtr,
    table: CorrelationTable,
    ids: IdGenerator,
}

impl CallIssuer {
    // ---

    pub fn new(sender: SenderPtr) -> Self {
        // ---
        Self {
            sender,
            table: CorrelationTable::new(),
            ids: IdGenerator::new(),
        }
    }

    pub fn sender(&self) -> &SenderPtr {
        &self.sender
    }

    /// Send a call and wait for the matching response.
    ///
    /// The pending entry is registered before the sender runs so a response
    /// delivered during the send itself (loopback transports) still finds it.
    /// The timeout clock starts at registration as well.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] if no response lands within `timeout`
    /// - [`RpcError::Remote`] if the response reports failure
    /// - whatever the sender returned if the send itself failed
    /// - [`RpcError::ChannelClosed`] if the channel is closed meanwhile
    pub async fn call(&self, method: &str, payload: Value, timeout: Duration) -> Result<Value> {
        // ---
        let (correlation_id, rx) = self.table.register(&self.ids)?;
        let _guard = PendingGuard::new(&self.table, correlation_id);
        let deadline = Instant::now() + timeout;

        crate::log_trace!("call {method} id={correlation_id}");

        let call = WrappedCall::new(correlation_id, method, payload);
        self.sender.send(Message::Call(call)).await?;

        // A response that already arrived wins even if the deadline has passed
        let response = match time::timeout_at(deadline, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(RpcError::ChannelClosed),
            Err(_) => {
                crate::log_debug!("call {method} id={correlation_id} timed out after {timeout:?}");
                return Err(RpcError::Timeout);
            }
        };

        if response.success {
            Ok(response.payload)
        } else {
            Err(RpcError::Remote(response.payload))
        }
    }

    /// Send a fire-and-forget call; completes when the send completes.
    pub async fn call_without_response(&self, method: &str, payload: Value) -> Result<()> {
        // ---
        crate::log_trace!("fire-and-forget {method}");

        let call = WrappedCall::new(CorrelationId::FIRE_AND_FORGET, method, payload);
        self.sender.send(Message::Call(call)).await
    }

    /// Deliver an inbound response to its pending call, if any.
    pub fn complete(&self, response: WrappedResponse) -> bool {
        // ---
        let correlation_id = response.correlation_id;
        let matched = self.table.complete(response);
        if !matched {
            crate::log_debug!("no pending call for correlation_id: {correlation_id}");
        }
        matched
    }

    /// Move the id counter past an id seen from the peer.
    pub fn observe(&self, correlation_id: CorrelationId) {
        self.ids.observe(correlation_id);
    }

    pub fn pending_calls(&self) -> usize {
        self.table.len()
    }

    /// Fail every pending call and refuse new ones.
    pub fn close(&self) -> usize {
        // ---
        let abandoned = self.table.close();
        if abandoned > 0 {
            crate::log_debug!("closed with {abandoned} pending call(s)");
        }
        abandoned
    }
}
