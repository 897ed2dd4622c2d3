//! Error types for RPC operations
//!
//! This module provides the closed outcome taxonomy used by every layer of
//! the pipeline, and the [`RpcError`] type that travels through it.
//!
//! # Codes
//!
//! Outcome codes are represented by the [`RpcCode`] enum. Each code maps to
//! exactly one HTTP status via [`RpcCode::http_status`]. On the wire, codes
//! are `RPC_`-prefixed SCREAMING_SNAKE_CASE strings (`"RPC_NOT_FOUND"`).
//!
//! # Example
//! ```rust
//! use duck_rpc::{RpcError, RpcCode};
//!
//! let error = RpcError::new(RpcCode::NotFound, "User not found");
//! let error = RpcError::not_found("User not found"); // Convenience method
//! assert_eq!(error.code.http_status(), 404);
//! ```

use crate::schema::Issue;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Closed taxonomy of RPC outcome codes.
///
/// Codes classify every envelope that leaves the server: two success codes
/// and a set of failure codes roughly mirroring HTTP semantics, plus
/// RPC-specific codes in the 460-465 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    /// The call succeeded
    Ok,
    /// The call succeeded and created a resource
    Created,
    /// The request was malformed or invalid
    BadRequest,
    /// Authentication is required
    Unauthorized,
    /// The authenticated caller lacks permission
    Forbidden,
    /// The requested resource or path was not found
    NotFound,
    /// The HTTP method is not supported
    MethodNotAllowed,
    /// The call timed out
    Timeout,
    /// The request conflicts with current state
    Conflict,
    /// A precondition of the call does not hold
    PreconditionFailed,
    /// The request payload exceeds size limits
    PayloadTooLarge,
    /// The request media type is not supported
    UnsupportedMediaType,
    /// Too many requests - rate limit exceeded
    TooManyRequests,
    /// The request envelope could not be parsed
    ParseError,
    /// Input validation failed
    ValidationError,
    /// The requested procedure was not found
    ProcedureNotFound,
    /// Context creation failed
    ContextError,
    /// An error occurred in middleware execution
    MiddlewareError,
    /// Serialization or deserialization failed
    SerializationError,
    /// An unexpected internal error occurred
    InternalServerError,
    /// The requested functionality is not implemented
    NotImplemented,
    /// An upstream dependency returned an invalid response
    BadGateway,
    /// The service is temporarily unavailable
    ServiceUnavailable,
    /// An upstream dependency timed out
    GatewayTimeout,
}

impl RpcCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "RPC_OK",
            Self::Created => "RPC_CREATED",
            Self::BadRequest => "RPC_BAD_REQUEST",
            Self::Unauthorized => "RPC_UNAUTHORIZED",
            Self::Forbidden => "RPC_FORBIDDEN",
            Self::NotFound => "RPC_NOT_FOUND",
            Self::MethodNotAllowed => "RPC_METHOD_NOT_ALLOWED",
            Self::Timeout => "RPC_TIMEOUT",
            Self::Conflict => "RPC_CONFLICT",
            Self::PreconditionFailed => "RPC_PRECONDITION_FAILED",
            Self::PayloadTooLarge => "RPC_PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType => "RPC_UNSUPPORTED_MEDIA_TYPE",
            Self::TooManyRequests => "RPC_TOO_MANY_REQUESTS",
            Self::ParseError => "RPC_PARSE_ERROR",
            Self::ValidationError => "RPC_VALIDATION_ERROR",
            Self::ProcedureNotFound => "RPC_PROCEDURE_NOT_FOUND",
            Self::ContextError => "RPC_CONTEXT_ERROR",
            Self::MiddlewareError => "RPC_MIDDLEWARE_ERROR",
            Self::SerializationError => "RPC_SERIALIZATION_ERROR",
            Self::InternalServerError => "RPC_INTERNAL_SERVER_ERROR",
            Self::NotImplemented => "RPC_NOT_IMPLEMENTED",
            Self::BadGateway => "RPC_BAD_GATEWAY",
            Self::ServiceUnavailable => "RPC_SERVICE_UNAVAILABLE",
            Self::GatewayTimeout => "RPC_GATEWAY_TIMEOUT",
        }
    }

    /// Returns the HTTP status for this code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Timeout => 408,
            Self::Conflict => 409,
            Self::PreconditionFailed => 412,
            Self::PayloadTooLarge => 413,
            Self::UnsupportedMediaType => 415,
            Self::TooManyRequests => 429,
            Self::ParseError => 460,
            Self::ValidationError => 461,
            Self::ProcedureNotFound => 462,
            Self::ContextError => 463,
            Self::MiddlewareError => 464,
            Self::SerializationError => 465,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::BadGateway => 502,
            Self::ServiceUnavailable => 503,
            Self::GatewayTimeout => 504,
        }
    }

    /// Parses a wire code string back into a code.
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "RPC_OK" => Self::Ok,
            "RPC_CREATED" => Self::Created,
            "RPC_BAD_REQUEST" => Self::BadRequest,
            "RPC_UNAUTHORIZED" => Self::Unauthorized,
            "RPC_FORBIDDEN" => Self::Forbidden,
            "RPC_NOT_FOUND" => Self::NotFound,
            "RPC_METHOD_NOT_ALLOWED" => Self::MethodNotAllowed,
            "RPC_TIMEOUT" => Self::Timeout,
            "RPC_CONFLICT" => Self::Conflict,
            "RPC_PRECONDITION_FAILED" => Self::PreconditionFailed,
            "RPC_PAYLOAD_TOO_LARGE" => Self::PayloadTooLarge,
            "RPC_UNSUPPORTED_MEDIA_TYPE" => Self::UnsupportedMediaType,
            "RPC_TOO_MANY_REQUESTS" => Self::TooManyRequests,
            "RPC_PARSE_ERROR" => Self::ParseError,
            "RPC_VALIDATION_ERROR" => Self::ValidationError,
            "RPC_PROCEDURE_NOT_FOUND" => Self::ProcedureNotFound,
            "RPC_CONTEXT_ERROR" => Self::ContextError,
            "RPC_MIDDLEWARE_ERROR" => Self::MiddlewareError,
            "RPC_SERIALIZATION_ERROR" => Self::SerializationError,
            "RPC_INTERNAL_SERVER_ERROR" => Self::InternalServerError,
            "RPC_NOT_IMPLEMENTED" => Self::NotImplemented,
            "RPC_BAD_GATEWAY" => Self::BadGateway,
            "RPC_SERVICE_UNAVAILABLE" => Self::ServiceUnavailable,
            "RPC_GATEWAY_TIMEOUT" => Self::GatewayTimeout,
            _ => return None,
        })
    }

    /// Returns true if this code classifies a successful call (2xx).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Created)
    }

    /// Returns true if this is a client error (4xx class, including the
    /// RPC-specific 46x codes).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Returns true if this is a server error (5xx class).
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for RpcCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RpcCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        RpcCode::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown RPC code: {}", value)))
    }
}

/// Maps an arbitrary wire code string to an HTTP status.
///
/// Codes outside the closed taxonomy fall back to 500.
pub fn status_for_code(code: &str) -> u16 {
    RpcCode::parse(code).map_or(500, |c| c.http_status())
}

/// RPC error carrying a taxonomy code, a human-readable message, optional
/// validation issues and an optional in-process cause.
///
/// The cause is never serialized to the wire; it exists for logging.
///
/// # Example
/// ```rust
/// use duck_rpc::RpcError;
///
/// let error = RpcError::not_found("User not found")
///     .with_cause("database lookup returned no rows");
/// ```
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct RpcError {
    /// Taxonomy code classifying the failure
    pub code: RpcCode,
    /// Human-readable error message
    pub message: String,
    /// Validation issues (empty if none)
    pub issues: Vec<Issue>,
    /// Optional cause for logging (never serialized)
    pub cause: Option<String>,
}

impl RpcError {
    /// Create a new error with code and message.
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            issues: Vec::new(),
            cause: None,
        }
    }

    /// Attach validation issues to the error.
    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    /// Attach a cause string for logging.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    // Convenience constructors

    /// Create an `RPC_BAD_REQUEST` error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcCode::BadRequest, message)
    }

    /// Create an `RPC_UNAUTHORIZED` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unauthorized, message)
    }

    /// Create an `RPC_FORBIDDEN` error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Forbidden, message)
    }

    /// Create an `RPC_NOT_FOUND` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcCode::NotFound, message)
    }

    /// Create an `RPC_TIMEOUT` error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Timeout, message)
    }

    /// Create an `RPC_CONFLICT` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Conflict, message)
    }

    /// Create an `RPC_PAYLOAD_TOO_LARGE` error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(RpcCode::PayloadTooLarge, message)
    }

    /// Create an `RPC_UNSUPPORTED_MEDIA_TYPE` error.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(RpcCode::UnsupportedMediaType, message)
    }

    /// Create an `RPC_TOO_MANY_REQUESTS` error.
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(RpcCode::TooManyRequests, message)
    }

    /// Create an `RPC_VALIDATION_ERROR` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RpcCode::ValidationError, message)
    }

    /// Create an `RPC_PROCEDURE_NOT_FOUND` error.
    pub fn procedure_not_found(path: &str) -> Self {
        Self::new(
            RpcCode::ProcedureNotFound,
            format!("Procedure '{}' not found", path),
        )
    }

    /// Create an `RPC_CONTEXT_ERROR` error.
    pub fn context(message: impl Into<String>) -> Self {
        Self::new(RpcCode::ContextError, message)
    }

    /// Create an `RPC_MIDDLEWARE_ERROR` error.
    pub fn middleware(message: impl Into<String>) -> Self {
        Self::new(RpcCode::MiddlewareError, message)
    }

    /// Create an `RPC_SERIALIZATION_ERROR` error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(RpcCode::SerializationError, message)
    }

    /// Create an `RPC_INTERNAL_SERVER_ERROR` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InternalServerError, message)
    }

    /// Create an `RPC_NOT_IMPLEMENTED` error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(RpcCode::NotImplemented, message)
    }

    /// Create an `RPC_SERVICE_UNAVAILABLE` error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::ServiceUnavailable, message)
    }

    /// Normalize a panic payload into an internal error.
    ///
    /// String payloads keep their text as both message and cause; any other
    /// payload becomes "Unknown error".
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let text = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()));
        match text {
            Some(text) => {
                trace!(panic = %text, "Normalizing panic payload");
                Self::internal(text.clone()).with_cause(text)
            }
            None => Self::internal("Unknown error"),
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {}", err))
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_strings_are_prefixed() {
        assert_eq!(RpcCode::Ok.as_str(), "RPC_OK");
        assert_eq!(RpcCode::ProcedureNotFound.as_str(), "RPC_PROCEDURE_NOT_FOUND");
        assert_eq!(
            RpcCode::InternalServerError.as_str(),
            "RPC_INTERNAL_SERVER_ERROR"
        );
    }

    #[test]
    fn test_status_table() {
        assert_eq!(RpcCode::Ok.http_status(), 200);
        assert_eq!(RpcCode::Created.http_status(), 201);
        assert_eq!(RpcCode::BadRequest.http_status(), 400);
        assert_eq!(RpcCode::ParseError.http_status(), 460);
        assert_eq!(RpcCode::ValidationError.http_status(), 461);
        assert_eq!(RpcCode::ProcedureNotFound.http_status(), 462);
        assert_eq!(RpcCode::ContextError.http_status(), 463);
        assert_eq!(RpcCode::MiddlewareError.http_status(), 464);
        assert_eq!(RpcCode::SerializationError.http_status(), 465);
        assert_eq!(RpcCode::GatewayTimeout.http_status(), 504);
    }

    #[test]
    fn test_unknown_code_string_maps_to_500() {
        assert_eq!(status_for_code("RPC_TOTALLY_CUSTOM"), 500);
        assert_eq!(status_for_code(""), 500);
        assert_eq!(status_for_code("RPC_NOT_FOUND"), 404);
    }

    #[test]
    fn test_code_serde_round_trip() {
        let json = serde_json::to_string(&RpcCode::Unauthorized).unwrap();
        assert_eq!(json, "\"RPC_UNAUTHORIZED\"");
        let back: RpcCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RpcCode::Unauthorized);
    }

    #[test]
    fn test_unknown_code_fails_to_deserialize() {
        let result: Result<RpcCode, _> = serde_json::from_str("\"RPC_NOPE\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_error_display() {
        let error = RpcError::not_found("User not found");
        assert_eq!(error.to_string(), "[RPC_NOT_FOUND] User not found");
    }

    #[test]
    fn test_error_cause_is_in_process_only() {
        let error = RpcError::internal("boom").with_cause("db connection reset");
        assert_eq!(error.cause.as_deref(), Some("db connection reset"));
    }

    #[test]
    fn test_from_panic_preserves_string_payload() {
        let error = RpcError::from_panic(Box::new("resolver exploded".to_string()));
        assert_eq!(error.code, RpcCode::InternalServerError);
        assert_eq!(error.message, "resolver exploded");
        assert_eq!(error.cause.as_deref(), Some("resolver exploded"));
    }

    #[test]
    fn test_from_panic_unknown_payload() {
        let error = RpcError::from_panic(Box::new(42_u32));
        assert_eq!(error.code, RpcCode::InternalServerError);
        assert_eq!(error.message, "Unknown error");
        assert!(error.cause.is_none());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = RpcError::from(json_err);
        assert_eq!(error.code, RpcCode::SerializationError);
    }
}
