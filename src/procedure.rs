//! Procedure builder and definition
//!
//! A procedure is built once at startup through the fluent
//! [`ProcedureBuilder`]: middlewares, optional input/output schemas and the
//! validation toggle accumulate step by step, and the `query`/`mutation`
//! terminals freeze everything into an immutable [`Procedure`]. The
//! middleware chain is composed at build time; each call only allocates the
//! resolver closure over its validated input.
//!
//! # Example
//!
//! ```rust,ignore
//! use duck_rpc::prelude::*;
//!
//! let hello = ProcedureBuilder::new()
//!     .input(object().field("name", string()))
//!     .query(|_ctx: AppCtx, input: HelloInput| async move {
//!         Envelope::ok(Greeting { greeting: format!("Hello {}", input.name) })
//!     });
//! ```

use crate::envelope::Envelope;
use crate::error::{RpcError, RpcResult};
use crate::middleware::{compose, from_fn, Dispatch, MiddlewareFn, MiddlewareResult, Next, Resolver};
use crate::schema::{self, Schema};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Type of procedure being called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureType {
    /// Read-only operation
    Query,
    /// Write operation
    Mutation,
}

impl ProcedureType {
    /// Parse a wire type string (`"query"` / `"mutation"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "mutation" => Some(Self::Mutation),
            _ => None,
        }
    }
}

impl fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
        }
    }
}

/// Whether input/output schemas are applied for a procedure.
///
/// `Off` disables both input and output parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Parse inputs and outputs through their schemas (the default)
    #[default]
    On,
    /// Bypass both schemas
    Off,
}

type UserResolver<Ctx> = Arc<dyn Fn(Ctx, Value) -> BoxFuture<'static, MiddlewareResult> + Send + Sync>;

/// Fluent, immutable-stepwise builder for a [`Procedure`].
///
/// Every transition consumes the builder and returns the extended one; the
/// `query`/`mutation` terminals produce the frozen procedure definition.
pub struct ProcedureBuilder<Ctx> {
    middlewares: Vec<MiddlewareFn<Ctx>>,
    input_schema: Option<Arc<dyn Schema>>,
    output_schema: Option<Arc<dyn Schema>>,
    validation: ValidationMode,
}

impl<Ctx> Default for ProcedureBuilder<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> ProcedureBuilder<Ctx> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
            input_schema: None,
            output_schema: None,
            validation: ValidationMode::On,
        }
    }

    /// Append a middleware.
    ///
    /// Middlewares execute in registration order (first registered =
    /// outermost) and may refine the context value they pass to `next`.
    pub fn use_middleware<F, Fut>(self, middleware: F) -> Self
    where
        Ctx: Send + 'static,
        F: Fn(Ctx, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MiddlewareResult> + Send + 'static,
    {
        self.use_middleware_fn(from_fn(middleware))
    }

    /// Append an already-wrapped middleware function.
    pub fn use_middleware_fn(mut self, middleware: MiddlewareFn<Ctx>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Set or replace the input schema.
    pub fn input(mut self, schema: impl Schema + 'static) -> Self {
        self.input_schema = Some(Arc::new(schema));
        self
    }

    /// Set or replace the output schema.
    pub fn output(mut self, schema: impl Schema + 'static) -> Self {
        self.output_schema = Some(Arc::new(schema));
        self
    }

    /// Toggle schema validation for this procedure.
    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.validation = mode;
        self
    }

    /// Terminal: produce a query procedure.
    pub fn query<In, H, Fut>(self, resolver: H) -> Procedure<Ctx>
    where
        Ctx: Send + 'static,
        In: DeserializeOwned + Send + 'static,
        H: Fn(Ctx, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Envelope>> + Send + 'static,
    {
        self.build(ProcedureType::Query, resolver)
    }

    /// Terminal: produce a mutation procedure.
    pub fn mutation<In, H, Fut>(self, resolver: H) -> Procedure<Ctx>
    where
        Ctx: Send + 'static,
        In: DeserializeOwned + Send + 'static,
        H: Fn(Ctx, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Envelope>> + Send + 'static,
    {
        self.build(ProcedureType::Mutation, resolver)
    }

    fn build<In, H, Fut>(self, proc_type: ProcedureType, resolver: H) -> Procedure<Ctx>
    where
        Ctx: Send + 'static,
        In: DeserializeOwned + Send + 'static,
        H: Fn(Ctx, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Envelope>> + Send + 'static,
    {
        debug!(
            procedure_type = %proc_type,
            middleware_count = self.middlewares.len(),
            has_input_schema = self.input_schema.is_some(),
            has_output_schema = self.output_schema.is_some(),
            validation = ?self.validation,
            "Building procedure"
        );

        let user: UserResolver<Ctx> = Arc::new(move |ctx, input| {
            match serde_json::from_value::<In>(input) {
                Ok(typed) => {
                    trace!("Executing procedure resolver");
                    Box::pin(resolver(ctx, typed))
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize input");
                    Box::pin(async move {
                        Err(RpcError::bad_request(format!("Invalid input: {}", e)))
                    })
                }
            }
        });

        Procedure {
            inner: Arc::new(ProcedureInner {
                proc_type,
                validation: self.validation,
                input_schema: self.input_schema,
                output_schema: self.output_schema,
                dispatch: compose(self.middlewares),
                resolver: user,
            }),
        }
    }
}

struct ProcedureInner<Ctx> {
    proc_type: ProcedureType,
    validation: ValidationMode,
    input_schema: Option<Arc<dyn Schema>>,
    output_schema: Option<Arc<dyn Schema>>,
    dispatch: Dispatch<Ctx>,
    resolver: UserResolver<Ctx>,
}

/// Immutable procedure definition: the call entry point of the pipeline.
///
/// Cheap to clone; all state is shared and read-only after construction.
pub struct Procedure<Ctx> {
    inner: Arc<ProcedureInner<Ctx>>,
}

impl<Ctx> Clone for Procedure<Ctx> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Ctx: Send + 'static> Procedure<Ctx> {
    /// The node kind tag.
    pub fn kind(&self) -> &'static str {
        "procedure"
    }

    /// The declared procedure type.
    pub fn proc_type(&self) -> ProcedureType {
        self.inner.proc_type
    }

    /// The validation mode for this procedure.
    pub fn validation(&self) -> ValidationMode {
        self.inner.validation
    }

    /// Invoke the procedure with a context and raw input.
    ///
    /// Runs input validation, the pre-composed middleware chain, the
    /// resolver and output validation; every failure path is folded into an
    /// error envelope so exactly one envelope comes back.
    pub async fn call(&self, ctx: Ctx, raw_input: Value) -> Envelope {
        let inner = &self.inner;
        let validate = inner.validation == ValidationMode::On;

        let input = if validate {
            match &inner.input_schema {
                Some(input_schema) => {
                    trace!("Parsing procedure input");
                    match schema::parse_input(&**input_schema, &raw_input) {
                        Ok(parsed) => parsed,
                        Err(error) => return Envelope::from(error),
                    }
                }
                None => raw_input,
            }
        } else {
            raw_input
        };

        let user = Arc::clone(&inner.resolver);
        let output_schema = if validate {
            inner.output_schema.clone()
        } else {
            None
        };
        let resolver: Resolver<Ctx> = Box::new(move |ctx| {
            Box::pin(async move {
                let envelope = user(ctx, input).await?;
                match (envelope, output_schema) {
                    (Envelope::Success { data, code }, Some(output_schema)) => {
                        trace!("Parsing procedure output");
                        let data = schema::parse_output(&*output_schema, &data)?;
                        Ok(Envelope::Success { data, code })
                    }
                    (envelope, _) => Ok(envelope),
                }
            })
        });

        match (inner.dispatch)(ctx, resolver).await {
            Ok(envelope) => envelope,
            Err(error) => Envelope::from(error),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
