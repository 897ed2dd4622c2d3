//! Service configuration
//!
//! [`RpcConfig`] customizes the HTTP adapter. All fields have defaults that
//! work out of the box.
//!
//! # Example
//! ```rust
//! use duck_rpc::RpcConfig;
//!
//! let config = RpcConfig::default()
//!     .with_endpoint_prefix("/api/rpc")
//!     .with_max_body_size(1024 * 1024);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigValidationError {
    /// endpoint_prefix must start with '/'
    #[error("endpoint_prefix must start with '/'")]
    InvalidPrefix,
    /// endpoint_prefix must not end with '/'
    #[error("endpoint_prefix must not end with '/'")]
    TrailingSlashPrefix,
    /// max_body_size must be greater than 0
    #[error("max_body_size must be greater than 0")]
    InvalidMaxBodySize,
}

/// Configuration for the HTTP adapter.
///
/// # Fields
///
/// * `endpoint_prefix` - Path prefix all RPC requests must carry.
///   Default: `/rpc`.
///
/// * `max_body_size` - Optional request-body cap in bytes. Bodies exceeding
///   the cap are rejected with `RPC_PAYLOAD_TOO_LARGE`. Default: no cap.
///
/// * `banner` - Value of the identifying `X-Powered-By` response header;
///   `None` disables the header. Default: `duck-rpc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Endpoint path prefix (default: `/rpc`)
    pub endpoint_prefix: String,
    /// Maximum request body size in bytes (default: unlimited)
    pub max_body_size: Option<usize>,
    /// `X-Powered-By` header value (default: `duck-rpc`)
    pub banner: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint_prefix: "/rpc".to_string(),
            max_body_size: None,
            banner: Some("duck-rpc".to_string()),
        }
    }
}

impl RpcConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint prefix.
    pub fn with_endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.endpoint_prefix = prefix.into();
        self
    }

    /// Set a request-body size cap in bytes.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    /// Set the `X-Powered-By` banner value.
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    /// Disable the `X-Powered-By` header.
    pub fn without_banner(mut self) -> Self {
        self.banner = None;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.endpoint_prefix.starts_with('/') {
            return Err(ConfigValidationError::InvalidPrefix);
        }
        if self.endpoint_prefix.len() > 1 && self.endpoint_prefix.ends_with('/') {
            return Err(ConfigValidationError::TrailingSlashPrefix);
        }
        if self.max_body_size == Some(0) {
            return Err(ConfigValidationError::InvalidMaxBodySize);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
