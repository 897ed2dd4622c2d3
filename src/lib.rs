#![warn(missing_docs)]
//! # duck-rpc
//!
//! A typed, transport-agnostic RPC server pipeline for Rust.
//!
//! Clients invoke named procedures over HTTP; the server resolves the
//! dotted procedure path, validates inputs, runs a pre-composed middleware
//! chain, executes the resolver, validates outputs, and answers with a
//! uniform response envelope in JSON or CBOR.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Host HTTP framework                     │
//! │        (hyper, axum, anything speaking http::Request)        │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RpcService          path + method checks, envelope parsing, │
//! │                      codec negotiation, context creation     │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Router              immutable tree, lazy dotted-path index  │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Procedure           input schema → middleware chain →       │
//! │                      resolver → output schema → Envelope     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use duck_rpc::prelude::*;
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Clone)]
//! struct AppCtx;
//!
//! #[derive(Deserialize)]
//! struct HelloInput { name: String }
//!
//! let hello = ProcedureBuilder::new()
//!     .input(object().field("name", string()))
//!     .query(|_ctx: AppCtx, input: HelloInput| async move {
//!         Envelope::ok(json!({ "greeting": format!("Hello {}", input.name) }))
//!     });
//!
//! let router = Router::builder().procedure("hello", hello).build();
//!
//! let service = RpcService::builder(router, |_parts| async move { Ok(AppCtx) })
//!     .build()?;
//!
//! // POST /rpc/hello  {"type":"query","input":{"name":"World"}}
//! //   → 200  {"ok":true,"data":{"greeting":"Hello World"},"code":"RPC_OK"}
//! ```
//!
//! ## Middleware
//!
//! Middlewares wrap a procedure call, refine the context, or short-circuit:
//!
//! ```rust,ignore
//! let guarded = ProcedureBuilder::new()
//!     .use_middleware(|ctx: AppCtx, next: Next<AppCtx>| async move {
//!         if ctx.user.is_none() {
//!             return Err(RpcError::unauthorized("Missing user"));
//!         }
//!         next.run(ctx).await
//!     })
//!     .query(profile);
//! ```
//!
//! Chains are composed once when the procedure is built; each request only
//! allocates the resolver closure over its validated input.
//!
//! ## Wire formats
//!
//! JSON is the default; CBOR is selected when the request's `Accept` header
//! mentions `application/cbor`, or failing that when the request body itself
//! is CBOR. Every response is the envelope:
//!
//! ```text
//! { "ok": true,  "data": <T>,   "code": "RPC_OK" }
//! { "ok": false, "code": "...", "error": { "code", "message", "issues" } }
//! ```

pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod middleware;
pub mod procedure;
pub mod router;
pub mod schema;

pub use crate::codec::{
    decode_envelope, decode_request_body, encode_envelope, is_cbor_content_type,
    negotiate_response_format, serialize_response, DecodedBody, ResponseFormat,
};
pub use crate::config::{ConfigValidationError, RpcConfig};
pub use crate::envelope::{Envelope, ErrorBody};
pub use crate::error::{status_for_code, RpcCode, RpcError, RpcResult};
pub use crate::http::{CreateContext, RpcService, RpcServiceBuilder};
pub use crate::middleware::{
    compose, from_fn, logging_middleware, Dispatch, MiddlewareFn, MiddlewareResult, Next, Resolver,
};
pub use crate::procedure::{Procedure, ProcedureBuilder, ProcedureType, ValidationMode};
pub use crate::router::{Node, Router, RouterBuilder};
pub use crate::schema::{parse_input, parse_output, Issue, PathSegment, Schema};

/// Prelude for convenient imports
///
/// ```rust,ignore
/// use duck_rpc::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::RpcConfig;
    pub use crate::envelope::{Envelope, ErrorBody};
    pub use crate::error::{RpcCode, RpcError, RpcResult};
    pub use crate::http::{RpcService, RpcServiceBuilder};
    pub use crate::middleware::{
        from_fn, logging_middleware, MiddlewareFn, MiddlewareResult, Next,
    };
    pub use crate::procedure::{Procedure, ProcedureBuilder, ProcedureType, ValidationMode};
    pub use crate::router::{Node, Router, RouterBuilder};
    pub use crate::schema::{
        array, boolean, custom, integer, number, object, optional, string, Issue, PathSegment,
        Schema,
    };
}
