//! HTTP request/response adapter
//!
//! [`RpcService`] bridges a host HTTP framework to the procedure pipeline:
//! it resolves the procedure path from the URL, parses the request envelope
//! (POST body in JSON or CBOR, GET query parameters), creates the per-request
//! context, invokes the procedure, and serializes the resulting envelope in
//! the negotiated wire format.
//!
//! The service is listener-agnostic. Hosts call [`RpcService::handle`] with
//! any [`http_body::Body`] (hyper's `Incoming`, a test `Full<Bytes>`, ...),
//! or [`RpcService::handle_parts`] when they have already consumed the body.
//!
//! Every request produces exactly one response: all failure paths, panics
//! included, fold into a serialized error envelope.
//!
//! # Example
//!
//! ```rust,ignore
//! use duck_rpc::prelude::*;
//!
//! let service = RpcService::builder(router, |parts| async move {
//!     Ok(AppCtx { user: parts.headers.get("x-user").is_some() })
//! })
//! .config(RpcConfig::default().with_endpoint_prefix("/rpc"))
//! .build()?;
//!
//! // inside the host's connection handler:
//! let response = service.handle(request).await;
//! ```

use crate::codec::{self, ResponseFormat};
use crate::config::{ConfigValidationError, RpcConfig};
use crate::envelope::Envelope;
use crate::error::{RpcError, RpcResult};
use crate::procedure::ProcedureType;
use crate::router::Router;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::request::Parts;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use serde_json::{Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-request context factory: receives the request head, returns the
/// user context carried through middlewares and into the resolver.
pub type CreateContext<Ctx> =
    Arc<dyn Fn(Arc<Parts>) -> BoxFuture<'static, RpcResult<Ctx>> + Send + Sync>;

/// The HTTP adapter over a root router.
pub struct RpcService<Ctx> {
    router: Router<Ctx>,
    create_context: CreateContext<Ctx>,
    config: RpcConfig,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<Ctx> Clone for RpcService<Ctx> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            create_context: Arc::clone(&self.create_context),
            config: self.config.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// Builder for [`RpcService`].
pub struct RpcServiceBuilder<Ctx> {
    router: Router<Ctx>,
    create_context: CreateContext<Ctx>,
    config: RpcConfig,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<Ctx> RpcServiceBuilder<Ctx> {
    /// Replace the service configuration.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a response header applied to every response.
    ///
    /// Caller headers win over defaults of the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Validate the configuration and build the service.
    pub fn build(self) -> Result<RpcService<Ctx>, ConfigValidationError> {
        self.config.validate()?;
        debug!(
            endpoint_prefix = %self.config.endpoint_prefix,
            max_body_size = ?self.config.max_body_size,
            "RPC service built"
        );
        Ok(RpcService {
            router: self.router,
            create_context: self.create_context,
            config: self.config,
            headers: self.headers,
        })
    }
}

impl<Ctx: Send + 'static> RpcService<Ctx> {
    /// Start building a service over a root router and a context factory.
    pub fn builder<F, Fut>(router: Router<Ctx>, create_context: F) -> RpcServiceBuilder<Ctx>
    where
        F: Fn(Arc<Parts>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Ctx>> + Send + 'static,
    {
        RpcServiceBuilder {
            router,
            create_context: Arc::new(move |parts| Box::pin(create_context(parts))),
            config: RpcConfig::default(),
            headers: Vec::new(),
        }
    }

    /// Handle a request, reading the body from the host's body type.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: http_body::Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();
        let bytes = if parts.method == Method::POST {
            match read_body(body, self.config.max_body_size).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    let format = codec::negotiate_response_format(&parts.headers);
                    return self.respond(Envelope::from(error), format);
                }
            }
        } else {
            Bytes::new()
        };
        self.handle_parts(parts, bytes).await
    }

    /// Handle a request whose body the host already consumed.
    pub async fn handle_parts(&self, parts: Parts, body: Bytes) -> Response<Full<Bytes>> {
        let format = codec::negotiate_response_format(&parts.headers);
        let outcome = AssertUnwindSafe(self.process(parts, body)).catch_unwind().await;
        let envelope = match outcome {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(error)) => {
                debug!(code = %error.code, message = %error.message, "Request failed");
                Envelope::from(error)
            }
            Err(panic) => {
                warn!("Panic while handling request");
                Envelope::from(RpcError::from_panic(panic))
            }
        };
        self.respond(envelope, format)
    }

    async fn process(&self, parts: Parts, body: Bytes) -> RpcResult<Envelope> {
        let parts = Arc::new(parts);

        let path = parts.uri.path();
        let Some(rest) = path.strip_prefix(self.config.endpoint_prefix.as_str()) else {
            return Err(RpcError::not_found(format!("Unknown endpoint: {}", path)));
        };
        if parts.method != Method::GET && parts.method != Method::POST {
            return Err(RpcError::bad_request(format!(
                "Unsupported method: {}",
                parts.method
            )));
        }

        let ctx = (self.create_context)(Arc::clone(&parts)).await?;

        let procedure_path = rest.strip_prefix('/').unwrap_or(rest).to_string();
        let segments: Vec<&str> = procedure_path.split('.').collect();

        let (requested_type, input) = if parts.method == Method::POST {
            parse_post_envelope(parts.as_ref(), &body)?
        } else {
            parse_get_envelope(parts.as_ref())?
        };

        let Some(procedure) = self.router.procedure_at_path(&segments) else {
            debug!(path = %procedure_path, available = ?self.router.paths(), "Procedure not found");
            return Err(RpcError::not_found(format!(
                "Procedure '{}' not found",
                procedure_path
            )));
        };

        if procedure.proc_type() != requested_type {
            return Err(RpcError::bad_request(format!(
                "Procedure type mismatch: '{}' is a {}, request declared {}",
                procedure_path,
                procedure.proc_type(),
                requested_type
            )));
        }

        trace!(path = %procedure_path, procedure_type = %requested_type, "Dispatching procedure");
        Ok(procedure.call(ctx, input).await)
    }

    fn respond(&self, envelope: Envelope, format: ResponseFormat) -> Response<Full<Bytes>> {
        let status = envelope.http_status();
        let mut response =
            codec::serialize_response(&envelope, status, format).unwrap_or_else(|error| {
                warn!(message = %error.message, "Failed to serialize response envelope");
                fallback_response()
            });
        if let Some(banner) = &self.config.banner {
            if let Ok(value) = HeaderValue::from_str(banner) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-powered-by"), value);
            }
        }
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

async fn read_body<B>(body: B, limit: Option<usize>) -> RpcResult<Bytes>
where
    B: http_body::Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match limit {
        Some(limit) => Limited::new(body, limit)
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                    warn!(limit, "Request body exceeded the configured cap");
                    RpcError::payload_too_large(format!("Request body exceeds {} bytes", limit))
                } else {
                    RpcError::internal("Failed to read request body").with_cause(e.to_string())
                }
            }),
        None => body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                let e: Box<dyn std::error::Error + Send + Sync> = e.into();
                RpcError::internal("Failed to read request body").with_cause(e.to_string())
            }),
    }
}

fn parse_post_envelope(parts: &Parts, body: &Bytes) -> RpcResult<(ProcedureType, Value)> {
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let decoded = codec::decode_request_body(content_type, body)?;

    let Value::Object(map) = decoded.body else {
        return Err(RpcError::bad_request(format!(
            "Invalid {} request body: expected an object with 'type' and 'input'",
            decoded.format
        )));
    };
    let Some(type_str) = map.get("type").and_then(Value::as_str) else {
        return Err(RpcError::bad_request(
            "Request envelope is missing a valid 'type' field",
        ));
    };
    let Some(requested) = ProcedureType::parse(type_str) else {
        return Err(RpcError::bad_request(format!(
            "Unknown procedure type: {}",
            type_str
        )));
    };
    let input = map.get("input").cloned().unwrap_or(Value::Null);
    Ok((requested, input))
}

fn parse_get_envelope(parts: &Parts) -> RpcResult<(ProcedureType, Value)> {
    let query = parts.uri.query().unwrap_or("");
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| RpcError::bad_request(format!("Invalid query string: {}", e)))?;

    let mut type_str = None;
    let mut input_param = None;
    let mut flat = Map::new();
    for (key, value) in pairs {
        match key.as_str() {
            "type" => type_str = Some(value),
            "input" => input_param = Some(value),
            _ => {
                flat.insert(key, Value::String(value));
            }
        }
    }

    let type_str = type_str.unwrap_or_else(|| "query".to_string());
    let Some(requested) = ProcedureType::parse(&type_str) else {
        return Err(RpcError::bad_request(format!(
            "Unknown procedure type: {}",
            type_str
        )));
    };

    // `input` is JSON when it parses, the raw string otherwise; without an
    // `input` parameter the remaining pairs form a flat object.
    let input = match input_param {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        None => Value::Object(flat),
    };
    Ok((requested, input))
}

fn fallback_response() -> Response<Full<Bytes>> {
    let body = concat!(
        r#"{"ok":false,"code":"RPC_SERIALIZATION_ERROR","#,
        r#""error":{"code":"RPC_SERIALIZATION_ERROR","message":"Failed to serialize response","issues":[]}}"#
    );
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() =
        StatusCode::from_u16(465).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

// =============================================================================
// Tests
// =============================================================================
