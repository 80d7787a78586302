use crate::protocol::CorrelationId;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-invocation details handed to a handler next to the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    /// Id of the inbound call; the sentinel for fire-and-forget calls.
    pub correlation_id: CorrelationId,

    /// Host-supplied auxiliary data attached to the inbound call, if any.
    pub aux_data: Option<Value>,

    /// True when the caller expects no response. Whatever the handler
    /// returns is discarded.
    pub fire_and_forget: bool,
}

// Handler trait for type-erased async functions
pub(crate) trait HandlerFn: Send + Sync {
    fn call(&self, payload: Value, ctx: CallContext) -> BoxFuture<'static, Result<Value>>;
}

// Handler working directly on JSON payloads
pub(crate) struct RawHandler<F> {
    func: F,
}

impl<F, Fut> RawHandler<F>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> HandlerFn for RawHandler<F>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn call(&self, payload: Value, ctx: CallContext) -> BoxFuture<'static, Result<Value>> {
        Box::pin((self.func)(payload, ctx))
    }
}

// Handler over serde types; payload decode failures become handler failures
pub(crate) struct TypedHandler<F, Fut, TReq, TResp>
where
    F: Fn(TReq, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TResp>> + Send,
    TReq: DeserializeOwned,
    TResp: Serialize,
{
    func: F,
    _phantom: PhantomData<fn(TReq, TResp, Fut)>,
}

impl<F, Fut, TReq, TResp> TypedHandler<F, Fut, TReq, TResp>
where
    F: Fn(TReq, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TResp>> + Send,
    TReq: DeserializeOwned,
    TResp: Serialize,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut, TReq, TResp> HandlerFn for TypedHandler<F, Fut, TReq, TResp>
where
    F: Fn(TReq, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TResp>> + Send + 'static,
    TReq: DeserializeOwned + Send + 'static,
    TResp: Serialize + Send + 'static,
{
    fn call(&self, payload: Value, ctx: CallContext) -> BoxFuture<'static, Result<Value>> {
        // Deserialize request
        let req: TReq = match serde_json::from_value(payload) {
            Ok(r) => r,
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        };

        // Call handler
        let fut = (self.func)(req, ctx);

        Box::pin(async move {
            let resp = fut.await?;
            Ok(serde_json::to_value(resp)?)
        })
    }
}
