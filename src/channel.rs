//! Call/response channel.
//!
//! A [`Channel`] ties together the outbound half (call issuing, correlation
//! table, timeouts) and the inbound half (handler registry, dispatch) of one
//! logical RPC endpoint. It never touches the transport directly: outbound
//! messages go through the [`Sender`](crate::Sender) it was built with, and
//! inbound messages are pushed in by the host through the `consume*` entry
//! points.
//!
//! # Hierarchy
//!
//! [`Channel::derive_sub_channel`] creates a channel with its own sender and
//! correlation table that dispatches through the parent's handler registry.
//! The registry is shared by reference, so handlers registered on the root
//! later are visible to every sub-channel, but a sub-channel can never
//! register or remove handlers itself.

use crate::client::CallIssuer;
use crate::protocol::{codec, CorrelationId, Message, WrappedCall, WrappedResponse};
use crate::server::{
    dispatch_call, CallContext, HandlerFn, HandlerRegistry, RawHandler, RegistryPtr,
    TypedHandler,
};
use crate::{ChannelConfig, ChannelRole, Consumed, IdPolicy, Result, RpcError, SenderPtr};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// One endpoint of a call/response link.
///
/// Cloning is cheap and every clone refers to the same channel.
///
/// # Example
///
/// ```
/// use anyrpc::{sender_fn, Channel};
/// use serde_json::{json, Value};
///
/// let channel = Channel::new(sender_fn(|_msg| async { Ok(()) }));
/// channel
///     .set_handler("echo", |payload: Value, _ctx| async move { Ok(payload) })
///     .unwrap();
/// assert!(channel.has_handler("echo"));
/// ```
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`Channel`].
///
/// Used by long-lived tasks and forwarding handlers that must not keep a
/// channel alive on their own.
#[derive(Clone)]
pub struct WeakChannel {
    inner: Weak<Inner>,
}

impl WeakChannel {
    pub fn upgrade(&self) -> Option<Channel> {
        self.inner.upgrade().map(|inner| Channel { inner })
    }
}

struct Inner {
    issuer: CallIssuer,
    registry: RegistryPtr,
    role: ChannelRole,
    config: ChannelConfig,
}

impl Channel {
    // ---

    /// Create a root channel with default configuration.
    pub fn new(sender: SenderPtr) -> Self {
        Self::with_config(sender, ChannelConfig::default())
    }

    /// Create a root channel.
    pub fn with_config(sender: SenderPtr, config: ChannelConfig) -> Self {
        // ---
        Self::from_parts(sender, HandlerRegistry::new(), ChannelRole::Root, config)
    }

    fn from_parts(
        sender: SenderPtr,
        registry: RegistryPtr,
        role: ChannelRole,
        config: ChannelConfig,
    ) -> Self {
        // ---
        Self {
            inner: Arc::new(Inner {
                issuer: CallIssuer::new(sender),
                registry,
                role,
                config,
            }),
        }
    }

    pub fn role(&self) -> ChannelRole {
        self.inner.role
    }

    pub fn is_sub_channel(&self) -> bool {
        self.inner.role == ChannelRole::Sub
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakChannel {
        WeakChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // --------------------
    // Outbound
    // --------------------

    /// Call `method` on the peer using the channel's default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Timeout`] if no response arrives in time,
    /// [`RpcError::Remote`] if the peer's handler failed, or the sender's
    /// error if the call could not be sent.
    pub async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        self.call_with_timeout(method, payload, self.inner.config.default_timeout)
            .await
    }

    /// Call `method` on the peer with an explicit timeout.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.inner.issuer.call(method, payload, timeout).await
    }

    /// Typed variant of [`call`](Self::call).
    pub async fn call_typed<TReq, TResp>(&self, method: &str, req: TReq) -> Result<TResp>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        self.call_typed_with_timeout(method, req, self.inner.config.default_timeout)
            .await
    }

    /// Typed variant of [`call_with_timeout`](Self::call_with_timeout).
    pub async fn call_typed_with_timeout<TReq, TResp>(
        &self,
        method: &str,
        req: TReq,
        timeout: Duration,
    ) -> Result<TResp>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        // ---
        let payload = serde_json::to_value(req)?;
        let response = self.call_with_timeout(method, payload, timeout).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Send a call that expects no response.
    ///
    /// Completes as soon as the sender does; never waits on the peer and
    /// never occupies the correlation table.
    pub async fn call_without_response(&self, method: &str, payload: Value) -> Result<()> {
        self.inner.issuer.call_without_response(method, payload).await
    }

    /// Number of calls currently waiting for a response on this channel.
    pub fn pending_calls(&self) -> usize {
        self.inner.issuer.pending_calls()
    }

    /// Fail every pending call with [`RpcError::ChannelClosed`] and refuse
    /// new calls. Dispatch of inbound calls keeps working.
    ///
    /// Returns how many calls were pending.
    pub fn close(&self) -> usize {
        self.inner.issuer.close()
    }

    // --------------------
    // Handlers
    // --------------------

    /// Register a handler working on raw JSON payloads.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ChannelRole`] on a sub-channel and
    /// [`RpcError::DuplicateHandler`] if `method` already has a handler and
    /// override is not enabled.
    pub fn set_handler<F, Fut>(&self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(method, Arc::new(RawHandler::new(handler)))
    }

    /// Register a handler over serde types.
    ///
    /// A payload that fails to decode as `TReq` is answered with a failure
    /// response carrying the decode error.
    pub fn set_typed_handler<TReq, TResp, F, Fut>(&self, method: &str, handler: F) -> Result<()>
    where
        TReq: DeserializeOwned + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TReq, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.register(method, Arc::new(TypedHandler::new(handler)))
    }

    /// Answer `method` by re-issuing it on `target` and relaying the result.
    ///
    /// Normal calls become `target.call_with_timeout(method, payload, timeout)`;
    /// fire-and-forget calls become `target.call_without_response(method, payload)`.
    /// Auxiliary data on the inbound call is not forwarded; fold it into the
    /// payload if the far side needs it.
    ///
    /// Only a weak handle to `target` is kept, so the caller must keep the
    /// target channel alive. Once it is gone, forwarded calls fail with
    /// [`RpcError::ChannelClosed`]; a temporary target fails every call:
    ///
    /// ```no_run
    /// # use anyrpc::{memory_link, Channel};
    /// # use std::time::Duration;
    /// # let (a_out, _a_in) = memory_link(8);
    /// # let (b_out, _b_in) = memory_link(8);
    /// let gateway = Channel::new(a_out);
    /// let backend = Channel::new(b_out);
    /// gateway.set_forward(&backend, "lookup", Duration::from_secs(1))?;
    /// // `backend` must outlive the forward; dropping it here would turn
    /// // every forwarded "lookup" into a ChannelClosed failure.
    /// # Ok::<(), anyrpc::RpcError>(())
    /// ```
    pub fn set_forward(&self, target: &Channel, method: &str, timeout: Duration) -> Result<()> {
        // ---
        let target = target.downgrade();
        let forwarded = method.to_string();
        let warned = Arc::new(AtomicBool::new(false));

        self.set_handler(method, move |payload: Value, ctx: CallContext| {
            let target = target.clone();
            let method = forwarded.clone();
            let warned = warned.clone();
            async move {
                let Some(target) = target.upgrade() else {
                    if !warned.swap(true, Ordering::Relaxed) {
                        crate::log_warn!("forward target for {method} has been dropped");
                    }
                    return Err(RpcError::ChannelClosed);
                };
                if ctx.fire_and_forget {
                    target.call_without_response(&method, payload).await?;
                    Ok(Value::Null)
                } else {
                    target.call_with_timeout(&method, payload, timeout).await
                }
            }
        })
    }

    /// Remove the handler for `method`. Returns whether one was registered.
    pub fn remove_handler(&self, method: &str) -> Result<bool> {
        // ---
        self.ensure_root(method)?;
        Ok(self.inner.registry.remove(method))
    }

    /// True if dispatch on this channel would find a handler for `method`.
    pub fn has_handler(&self, method: &str) -> bool {
        self.inner.registry.contains(method)
    }

    fn register(&self, method: &str, handler: Arc<dyn HandlerFn>) -> Result<()> {
        // ---
        self.ensure_root(method)?;
        self.inner
            .registry
            .insert(method, handler, self.inner.config.allow_handler_override)
    }

    fn ensure_root(&self, method: &str) -> Result<()> {
        match self.inner.role {
            ChannelRole::Root => Ok(()),
            ChannelRole::Sub => Err(RpcError::ChannelRole(method.to_string())),
        }
    }

    // --------------------
    // Hierarchy
    // --------------------

    /// Create a sub-channel sending through `sender`.
    ///
    /// The sub-channel gets its own empty correlation table and id counter,
    /// shares this channel's handler registry by reference and copies its
    /// configuration.
    pub fn derive_sub_channel(&self, sender: SenderPtr) -> Channel {
        // ---
        Self::from_parts(
            sender,
            self.inner.registry.clone(),
            ChannelRole::Sub,
            self.inner.config.clone(),
        )
    }

    // --------------------
    // Inbound
    // --------------------

    /// Offer a decoded message to the channel, replying through its own sender.
    pub fn consume(&self, message: Message) -> Consumed {
        self.consume_with(message, self.inner.issuer.sender().clone())
    }

    /// Offer a decoded message, sending any response through `reply`.
    pub fn consume_with(&self, message: Message, reply: SenderPtr) -> Consumed {
        // ---
        match message {
            Message::Call(call) => self.consume_call_with(call, reply),
            Message::Response(response) => self.consume_response(response),
        }
    }

    /// Offer a raw JSON message. Anything that is neither a call nor a
    /// response comes back as [`Consumed::NotRecognized`].
    pub fn consume_value(&self, raw: &Value) -> Consumed {
        self.consume_value_with(raw, self.inner.issuer.sender().clone())
    }

    /// Raw JSON variant of [`consume_with`](Self::consume_with).
    pub fn consume_value_with(&self, raw: &Value, reply: SenderPtr) -> Consumed {
        // ---
        match Message::classify(raw) {
            Some(message) => self.consume_with(message, reply),
            None => Consumed::NotRecognized,
        }
    }

    /// Offer a JSON-encoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Serialization`] if the frame is not valid JSON.
    /// Valid JSON that is not one of the two shapes is
    /// [`Consumed::NotRecognized`], not an error.
    pub fn consume_bytes(&self, frame: &[u8]) -> Result<Consumed> {
        // ---
        let raw = codec::decode(frame)?;
        Ok(self.consume_value(&raw))
    }

    /// Offer a call, replying through the channel's own sender.
    pub fn consume_call(&self, call: WrappedCall) -> Consumed {
        self.consume_call_with(call, self.inner.issuer.sender().clone())
    }

    /// Offer a call, sending its response through `reply`.
    pub fn consume_call_with(&self, call: WrappedCall, reply: SenderPtr) -> Consumed {
        // ---
        if call.method.is_empty() {
            return Consumed::NotRecognized;
        }
        self.observe(call.correlation_id);

        let registry = self.inner.registry.clone();
        let ignore_unhandled = self.inner.config.ignore_unhandled;
        Consumed::Dispatching(Box::pin(dispatch_call(
            registry,
            ignore_unhandled,
            call,
            reply,
        )))
    }

    /// Offer a response; completes the matching pending call if there is one.
    pub fn consume_response(&self, response: WrappedResponse) -> Consumed {
        // ---
        self.observe(response.correlation_id);
        Consumed::Handled(self.inner.issuer.complete(response))
    }

    fn observe(&self, correlation_id: CorrelationId) {
        if self.inner.config.id_policy == IdPolicy::RebaseOnInbound {
            self.inner.issuer.observe(correlation_id);
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("role", &self.inner.role)
            .field("pending_calls", &self.pending_calls())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{sender_fn, DispatchOutcome};
    use serde_json::json;
    use std::sync::Mutex;

    /// Sender that records everything it is handed.
    fn recording_sender() -> (SenderPtr, Arc<Mutex<Vec<Message>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let sender = sender_fn(move |msg| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(msg);
                Ok(())
            }
        });
        (sender, sent)
    }

    fn echo(channel: &Channel) {
        channel
            .set_handler("echo", |payload: Value, _ctx| async move { Ok(payload) })
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_sends_success_response() {
        // ---
        let (sender, sent) = recording_sender();
        let channel = Channel::new(sender);
        echo(&channel);

        let call = WrappedCall::new(CorrelationId::new(4), "echo", json!("hi"));
        let outcome = channel.consume_call(call).wait().await.unwrap();
        assert_eq!(outcome, Some(DispatchOutcome::Responded { success: true }));

        let sent = sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            &[Message::Response(WrappedResponse::success(
                CorrelationId::new(4),
                json!("hi")
            ))]
        );
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure_response() {
        // ---
        let (sender, sent) = recording_sender();
        let channel = Channel::new(sender);
        channel
            .set_handler("boom", |_payload: Value, _ctx| async move {
                Err(RpcError::handler("kaboom"))
            })
            .unwrap();

        let call = WrappedCall::new(CorrelationId::new(1), "boom", Value::Null);
        let outcome = channel.consume_call(call).wait().await.unwrap();
        assert_eq!(outcome, Some(DispatchOutcome::Responded { success: false }));

        let sent = sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            &[Message::Response(WrappedResponse::failure(
                CorrelationId::new(1),
                json!("kaboom")
            ))]
        );
    }

    #[tokio::test]
    async fn test_unknown_method_answers_not_found() {
        // ---
        let (sender, sent) = recording_sender();
        let channel = Channel::new(sender);

        let call = WrappedCall::new(CorrelationId::new(2), "foo", Value::Null);
        let outcome = channel.consume_call(call).wait().await.unwrap();
        assert_eq!(outcome, Some(DispatchOutcome::Responded { success: false }));
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            &[Message::Response(WrappedResponse::failure(
                CorrelationId::new(2),
                json!("Method not found")
            ))]
        );
    }

    #[tokio::test]
    async fn test_ignore_unhandled_sends_nothing() {
        // ---
        let (sender, sent) = recording_sender();
        let channel =
            Channel::with_config(sender, ChannelConfig::default().with_ignore_unhandled(true));

        let call = WrappedCall::new(CorrelationId::new(2), "foo", Value::Null);
        let outcome = channel.consume_call(call).wait().await.unwrap();
        assert_eq!(outcome, Some(DispatchOutcome::Unhandled));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fire_and_forget_never_responds() {
        // ---
        let (sender, sent) = recording_sender();
        let channel = Channel::new(sender);
        echo(&channel);
        channel
            .set_handler("boom", |_payload: Value, _ctx| async move {
                Err(RpcError::handler("ignored"))
            })
            .unwrap();

        for method in ["echo", "boom", "missing"] {
            let call = WrappedCall::new(CorrelationId::FIRE_AND_FORGET, method, json!(1));
            let outcome = channel.consume_call(call).wait().await.unwrap();
            assert_eq!(outcome, Some(DispatchOutcome::FireAndForget));
        }
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handler_sees_aux_data_and_flag() {
        // ---
        let (sender, _sent) = recording_sender();
        let channel = Channel::new(sender);
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        channel
            .set_handler("whoami", move |_payload: Value, ctx: CallContext| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(ctx.clone());
                    Ok(ctx.aux_data.unwrap_or(Value::Null))
                }
            })
            .unwrap();

        let call = WrappedCall::new(CorrelationId::new(8), "whoami", Value::Null)
            .with_aux_data(json!({"session": 42}));
        channel.consume_call(call).wait().await.unwrap();

        let ctx = seen.lock().unwrap().clone().unwrap();
        assert_eq!(ctx.aux_data, Some(json!({"session": 42})));
        assert!(!ctx.fire_and_forget);
        assert_eq!(ctx.correlation_id, CorrelationId::new(8));
    }

    #[tokio::test]
    async fn test_reply_override_receives_response() {
        // ---
        let (own, own_sent) = recording_sender();
        let (other, other_sent) = recording_sender();
        let channel = Channel::new(own);
        echo(&channel);

        let call = WrappedCall::new(CorrelationId::new(3), "echo", json!(7));
        channel.consume_call_with(call, other).wait().await.unwrap();

        assert!(own_sent.lock().unwrap().is_empty());
        assert_eq!(other_sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_and_override() {
        // ---
        let (sender, _sent) = recording_sender();
        let strict = Channel::new(sender.clone());
        echo(&strict);
        let err = strict
            .set_handler("echo", |p: Value, _ctx| async move { Ok(p) })
            .unwrap_err();
        assert!(matches!(err, RpcError::DuplicateHandler(_)));

        let lenient =
            Channel::with_config(sender, ChannelConfig::default().with_handler_override(true));
        echo(&lenient);
        assert!(lenient
            .set_handler("echo", |p: Value, _ctx| async move { Ok(p) })
            .is_ok());
    }

    #[test]
    fn test_sub_channel_cannot_register() {
        // ---
        let (sender, _sent) = recording_sender();
        let root = Channel::new(sender.clone());
        let sub = root.derive_sub_channel(sender);

        assert!(sub.is_sub_channel());
        assert_eq!(root.role(), ChannelRole::Root);

        let err = sub
            .set_handler("echo", |p: Value, _ctx| async move { Ok(p) })
            .unwrap_err();
        assert!(matches!(err, RpcError::ChannelRole(_)));
        assert!(matches!(sub.remove_handler("echo"), Err(RpcError::ChannelRole(_))));
        assert!(matches!(
            sub.set_forward(&root, "echo", Duration::from_secs(1)),
            Err(RpcError::ChannelRole(_))
        ));

        // Registration on the root afterwards is visible through the sub
        echo(&root);
        assert!(sub.has_handler("echo"));
        assert!(root.remove_handler("echo").unwrap());
        assert!(!sub.has_handler("echo"));
    }

    #[test]
    fn test_consume_value_not_recognized() {
        // ---
        let (sender, _sent) = recording_sender();
        let channel = Channel::new(sender);
        let consumed = channel.consume_value(&json!({"type": "presence", "user": "x"}));
        assert!(!consumed.is_recognized());
    }

    #[test]
    fn test_unmatched_response_reports_false() {
        // ---
        let (sender, _sent) = recording_sender();
        let channel = Channel::new(sender);
        let consumed = channel.consume_value(&json!({"correlationId": 99, "success": true}));
        assert!(matches!(consumed, Consumed::Handled(false)));
    }

    #[tokio::test]
    async fn test_rebase_policy_skips_peer_ids() {
        // ---
        let (sender, sent) = recording_sender();
        let channel = Channel::with_config(
            sender,
            ChannelConfig::default().with_id_policy(IdPolicy::RebaseOnInbound),
        );

        channel.consume_response(WrappedResponse::success(CorrelationId::new(50), Value::Null));

        let fut = channel.call_with_timeout("x", Value::Null, Duration::from_millis(10));
        let _ = fut.await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].correlation_id(), CorrelationId::new(51));
    }
}
