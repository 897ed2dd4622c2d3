//! Response envelope
//!
//! Every call produces exactly one [`Envelope`]: either a success carrying
//! the resolver's data, or a failure carrying an [`ErrorBody`]. The wire
//! shape is the same in JSON and CBOR:
//!
//! ```text
//! { "ok": true,  "data": <T>,   "code": "RPC_OK" }
//! { "ok": false, "code": "...", "error": { "code", "message", "issues" } }
//! ```

use crate::error::{RpcCode, RpcError, RpcResult};
use crate::schema::Issue;
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// The error portion of a failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Taxonomy code classifying the failure
    pub code: RpcCode,
    /// Human-readable error message
    pub message: String,
    /// Validation issues (always present, empty if none)
    pub issues: Vec<Issue>,
}

impl From<&RpcError> for ErrorBody {
    fn from(error: &RpcError) -> Self {
        Self {
            code: error.code,
            message: error.message.clone(),
            issues: error.issues.clone(),
        }
    }
}

/// Uniform success/error response shape returned over the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Successful call: resolver data plus a 2xx-class code
    Success {
        /// Resolver output
        data: Value,
        /// Success code (`RPC_OK` or `RPC_CREATED`)
        code: RpcCode,
    },
    /// Failed call: the error body, with the code mirrored at the top level
    Error {
        /// Failure code, equal to `error.code`
        code: RpcCode,
        /// Error details
        error: ErrorBody,
    },
}

impl Envelope {
    /// Build a success envelope with `RPC_OK`.
    ///
    /// Serialization failure of `data` yields `RPC_SERIALIZATION_ERROR`.
    pub fn ok<T: Serialize>(data: T) -> RpcResult<Self> {
        Self::ok_with(data, RpcCode::Ok)
    }

    /// Build a success envelope with an explicit success code.
    pub fn ok_with<T: Serialize>(data: T, code: RpcCode) -> RpcResult<Self> {
        debug_assert!(code.is_success(), "success envelope requires a 2xx code");
        let data = serde_json::to_value(data)
            .map_err(|e| RpcError::serialization(format!("Failed to serialize data: {}", e)))?;
        Ok(Self::Success { data, code })
    }

    /// Build an error envelope from a code and message.
    pub fn err(code: RpcCode, message: impl Into<String>) -> Self {
        Self::from(RpcError::new(code, message))
    }

    /// Returns the envelope's outcome code.
    pub fn code(&self) -> RpcCode {
        match self {
            Self::Success { code, .. } => *code,
            Self::Error { code, .. } => *code,
        }
    }

    /// Returns the HTTP status mapped from the envelope's code.
    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    /// Returns true for success envelopes.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<RpcError> for Envelope {
    fn from(error: RpcError) -> Self {
        Self::Error {
            code: error.code,
            error: ErrorBody::from(&error),
        }
    }
}

impl From<&RpcError> for Envelope {
    fn from(error: &RpcError) -> Self {
        Self::Error {
            code: error.code,
            error: ErrorBody::from(error),
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success { data, code } => {
                let mut state = serializer.serialize_struct("Envelope", 3)?;
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
                state.serialize_field("code", code)?;
                state.end()
            }
            Self::Error { code, error } => {
                let mut state = serializer.serialize_struct("Envelope", 3)?;
                state.serialize_field("ok", &false)?;
                state.serialize_field("code", code)?;
                state.serialize_field("error", error)?;
                state.end()
            }
        }
    }
}

#[derive(Deserialize)]
struct WireEnvelope {
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    code: RpcCode,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::deserialize(deserializer)?;
        if wire.ok {
            Ok(Self::Success {
                data: wire.data.unwrap_or(Value::Null),
                code: wire.code,
            })
        } else {
            let error = wire.error.ok_or_else(|| D::Error::missing_field("error"))?;
            Ok(Self::Error {
                code: wire.code,
                error,
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
