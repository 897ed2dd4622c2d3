//! Middleware composition engine
//!
//! A middleware wraps the remainder of the pipeline: it receives the current
//! context and a [`Next`] handle, and may refine the context before handing
//! it on, short-circuit by returning an error, or post-process the envelope
//! coming back.
//!
//! Chains are composed **once** per procedure via [`compose`]; per request
//! only the resolver closure (which closes over the already-validated input)
//! varies.
//!
//! # Example
//!
//! ```rust,ignore
//! use duck_rpc::middleware::{from_fn, Next};
//!
//! let timing = from_fn(|ctx: AppCtx, next: Next<AppCtx>| async move {
//!     let start = std::time::Instant::now();
//!     let result = next.run(ctx).await;
//!     tracing::debug!(elapsed = ?start.elapsed(), "call finished");
//!     result
//! });
//! ```

use crate::envelope::Envelope;
use crate::error::RpcError;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of one middleware stage: `Ok` carries the downstream envelope,
/// `Err` short-circuits with an error whose code is preserved exactly.
pub type MiddlewareResult = Result<Envelope, RpcError>;

/// Middleware function type.
pub type MiddlewareFn<Ctx> =
    Arc<dyn Fn(Ctx, Next<Ctx>) -> BoxFuture<'static, MiddlewareResult> + Send + Sync>;

/// The per-request terminal stage: a one-shot closure over the validated
/// input that runs the user resolver.
pub type Resolver<Ctx> = Box<dyn FnOnce(Ctx) -> BoxFuture<'static, MiddlewareResult> + Send>;

/// A pre-composed middleware chain awaiting a per-request resolver.
pub type Dispatch<Ctx> =
    Arc<dyn Fn(Ctx, Resolver<Ctx>) -> BoxFuture<'static, MiddlewareResult> + Send + Sync>;

/// Handle to the rest of the chain, invokable at most once per activation.
///
/// Calling [`Next::run`] a second time within the same middleware activation
/// fails deterministically with `RPC_MIDDLEWARE_ERROR`.
pub struct Next<Ctx> {
    stage: Arc<Mutex<Option<Resolver<Ctx>>>>,
}

impl<Ctx> Clone for Next<Ctx> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
        }
    }
}

impl<Ctx> Next<Ctx> {
    pub(crate) fn new(
        stage: impl FnOnce(Ctx) -> BoxFuture<'static, MiddlewareResult> + Send + 'static,
    ) -> Self {
        Self {
            stage: Arc::new(Mutex::new(Some(Box::new(stage)))),
        }
    }

    /// Invoke the remainder of the chain with a (possibly refined) context.
    pub async fn run(&self, ctx: Ctx) -> MiddlewareResult {
        let stage = match self.stage.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => return Err(RpcError::middleware("next() guard poisoned")),
        };
        match stage {
            Some(stage) => stage(ctx).await,
            None => {
                warn!("next() called multiple times within one middleware activation");
                Err(RpcError::middleware("next() called multiple times"))
            }
        }
    }
}

/// Create a middleware from an async function or closure.
///
/// # Example
/// ```rust,ignore
/// async fn auth(ctx: AppCtx, next: Next<AppCtx>) -> MiddlewareResult {
///     if ctx.user.is_none() {
///         return Err(RpcError::unauthorized("Missing user"));
///     }
///     next.run(ctx).await
/// }
///
/// let middleware = from_fn(auth);
/// ```
pub fn from_fn<Ctx, F, Fut>(f: F) -> MiddlewareFn<Ctx>
where
    F: Fn(Ctx, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    Arc::new(move |ctx, next| Box::pin(f(ctx, next)))
}

/// Compose a middleware list into a single dispatch callable.
///
/// Middlewares execute in declaration order outbound; their continuations
/// run in reverse order inbound, with the resolver in between. The chain
/// structure is built here, once; `dispatch(ctx, resolver)` allocates
/// nothing beyond the per-stage futures.
pub fn compose<Ctx: Send + 'static>(middlewares: Vec<MiddlewareFn<Ctx>>) -> Dispatch<Ctx> {
    let terminal: Dispatch<Ctx> = Arc::new(|ctx, resolver| resolver(ctx));
    middlewares
        .into_iter()
        .rev()
        .fold(terminal, |inner, mw| -> Dispatch<Ctx> {
            Arc::new(move |ctx, resolver| {
                let inner = Arc::clone(&inner);
                let next = Next::new(move |ctx| inner(ctx, resolver));
                mw(ctx, next)
            })
        })
}

/// Ready-made middleware recording each call's outcome and elapsed time.
pub fn logging_middleware<Ctx: Send + 'static>() -> MiddlewareFn<Ctx> {
    from_fn(|ctx, next: Next<Ctx>| async move {
        let start = Instant::now();
        let result = next.run(ctx).await;
        match &result {
            Ok(envelope) => debug!(
                code = %envelope.code(),
                elapsed = ?start.elapsed(),
                "rpc call completed"
            ),
            Err(error) => warn!(
                code = %error.code,
                message = %error.message,
                elapsed = ?start.elapsed(),
                "rpc call failed"
            ),
        }
        result
    })
}

// =============================================================================
// Tests
// =============================================================================
