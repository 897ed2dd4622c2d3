//! Wire codecs and format negotiation
//!
//! Two wire formats are supported per request: textual JSON (the default,
//! safe fallback) and binary CBOR. Request bodies decode according to their
//! `Content-Type`; the response format is negotiated from the request's
//! `Accept` and `Content-Type` headers, first match wins.

use crate::envelope::Envelope;
use crate::error::{RpcError, RpcResult};
use bytes::Bytes;
use http::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde_json::Value;
use std::fmt;
use tracing::{trace, warn};

/// Wire format of a request body or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// `application/json`
    Json,
    /// `application/cbor`
    Cbor,
}

impl ResponseFormat {
    /// The content type emitted for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Cbor => "application/cbor",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Cbor => write!(f, "CBOR"),
        }
    }
}

/// Returns true if a `Content-Type` value denotes CBOR.
///
/// Parameters are stripped and the comparison is case-insensitive.
pub fn is_cbor_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or("");
    mime.trim().eq_ignore_ascii_case("application/cbor")
}

/// A decoded request body together with the format it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody {
    /// The decoded value; `null` when a JSON body failed to parse
    pub body: Value,
    /// The format the body was interpreted as
    pub format: ResponseFormat,
}

/// Decode a request body according to its content type.
///
/// CBOR bodies (`application/cbor`, parameters stripped, case-insensitive)
/// decode as CBOR and decode failures propagate. Anything else is
/// interpreted as JSON, and JSON decode failures yield a `null` body.
pub fn decode_request_body(content_type: Option<&str>, bytes: &[u8]) -> RpcResult<DecodedBody> {
    if content_type.is_some_and(is_cbor_content_type) {
        let body: Value = ciborium::de::from_reader(bytes).map_err(|e| {
            warn!(error = %e, "Failed to decode CBOR request body");
            RpcError::bad_request(format!("Invalid CBOR request body: {}", e))
        })?;
        trace!("Decoded CBOR request body");
        Ok(DecodedBody {
            body,
            format: ResponseFormat::Cbor,
        })
    } else {
        let body = serde_json::from_slice(bytes).unwrap_or(Value::Null);
        trace!("Decoded JSON request body");
        Ok(DecodedBody {
            body,
            format: ResponseFormat::Json,
        })
    }
}

/// Pick the response format from the request headers.
///
/// First match wins: an `Accept` header mentioning `application/cbor`
/// selects CBOR; else a CBOR `Content-Type` selects CBOR; else JSON.
pub fn negotiate_response_format(headers: &HeaderMap) -> ResponseFormat {
    if let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) {
        if accept.to_ascii_lowercase().contains("application/cbor") {
            return ResponseFormat::Cbor;
        }
    }
    if headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_cbor_content_type)
    {
        return ResponseFormat::Cbor;
    }
    ResponseFormat::Json
}

/// Encode an envelope in the given format into a fresh buffer.
pub fn encode_envelope(envelope: &Envelope, format: ResponseFormat) -> RpcResult<Bytes> {
    match format {
        ResponseFormat::Json => serde_json::to_vec(envelope).map(Bytes::from).map_err(|e| {
            RpcError::serialization(format!("Failed to encode JSON response: {}", e))
        }),
        ResponseFormat::Cbor => {
            let mut buffer = Vec::new();
            ciborium::ser::into_writer(envelope, &mut buffer).map_err(|e| {
                RpcError::serialization(format!("Failed to encode CBOR response: {}", e))
            })?;
            Ok(Bytes::from(buffer))
        }
    }
}

/// Decode a response body back into an envelope.
///
/// The read-side counterpart of [`encode_envelope`], for in-process callers
/// and tests.
pub fn decode_envelope(bytes: &[u8], format: ResponseFormat) -> RpcResult<Envelope> {
    match format {
        ResponseFormat::Json => serde_json::from_slice(bytes).map_err(|e| {
            RpcError::serialization(format!("Failed to decode JSON response: {}", e))
        }),
        ResponseFormat::Cbor => ciborium::de::from_reader(bytes).map_err(|e| {
            RpcError::serialization(format!("Failed to decode CBOR response: {}", e))
        }),
    }
}

/// Serialize an envelope into an HTTP response with the format's content
/// type and the status mapped from the envelope's code.
pub fn serialize_response(
    envelope: &Envelope,
    status: u16,
    format: ResponseFormat,
) -> RpcResult<Response<Full<Bytes>>> {
    let body = encode_envelope(envelope, format)?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, format.content_type())
        .body(Full::new(body))
        .map_err(|e| RpcError::internal(format!("Failed to build response: {}", e)))
}

// =============================================================================
// Tests
// =============================================================================
