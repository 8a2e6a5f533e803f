//! Error types for the common library.
//!
//! This module provides the error hierarchy shared by the pipeline's triggers,
//! built with `thiserror`.
//!
//! # Error Categories
//!
//! - `ConfigError`: Missing or invalid configuration
//! - `GcsError`: Object-store operations, classified as not-found, forbidden
//!   or transport failures
//! - `AuthError`: Authentication failures

use thiserror::Error;

/// Configuration errors.
///
/// These errors occur when loading or validating configuration from
/// environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new missing environment variable error.
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        ConfigError::MissingEnvVar(name.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// GCS operation type for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcsOperation {
    /// Read an object's content
    Read,
    /// Write a local file to an object
    Write,
    /// Check existence operation
    Exists,
}

impl std::fmt::Display for GcsOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GcsOperation::Read => write!(f, "read"),
            GcsOperation::Write => write!(f, "write"),
            GcsOperation::Exists => write!(f, "exists"),
        }
    }
}

/// Object-store errors.
///
/// Callers branch on the variant: `NotFound` and `Forbidden` are distinct
/// from `OperationFailed`, which covers network, quota and decoding failures.
#[derive(Debug, Error)]
pub enum GcsError {
    /// The object does not exist
    #[error("GCS object not found: {uri}")]
    NotFound {
        /// The GCS URI that was being accessed
        uri: String,
    },

    /// The caller lacks permission for the operation
    #[error("GCS {operation} forbidden for {uri}: {message}")]
    Forbidden {
        /// The GCS URI that was being accessed
        uri: String,
        /// The type of operation that was denied
        operation: GcsOperation,
        /// Error message returned by the service
        message: String,
    },

    /// A GCS operation failed with context about the URI and operation type
    #[error("GCS {operation} failed for {uri}: {message}")]
    OperationFailed {
        /// The GCS URI that was being accessed
        uri: String,
        /// The type of operation that failed
        operation: GcsOperation,
        /// Error message describing the failure
        message: String,
    },

    /// Authentication error during GCS operation
    #[error("GCS authentication error: {0}")]
    AuthError(String),
}

impl GcsError {
    /// Create a new not-found error.
    pub fn not_found(uri: impl Into<String>) -> Self {
        GcsError::NotFound { uri: uri.into() }
    }

    /// Create a new forbidden error.
    pub fn forbidden(
        uri: impl Into<String>,
        operation: GcsOperation,
        message: impl Into<String>,
    ) -> Self {
        GcsError::Forbidden {
            uri: uri.into(),
            operation,
            message: message.into(),
        }
    }

    /// Create a new operation failed error with full context.
    ///
    /// # Arguments
    ///
    /// * `uri` - The GCS URI that was being accessed
    /// * `operation` - The type of operation that failed
    /// * `message` - A description of the failure
    ///
    /// # Example
    ///
    /// ```
    /// use tts_pipeline_common::error::{GcsError, GcsOperation};
    ///
    /// let err = GcsError::operation_failed(
    ///     "gs://my-bucket/path/to/file.wav",
    ///     GcsOperation::Write,
    ///     "connection reset"
    /// );
    /// assert!(err.to_string().contains("gs://my-bucket"));
    /// assert!(err.to_string().contains("write"));
    /// ```
    pub fn operation_failed(
        uri: impl Into<String>,
        operation: GcsOperation,
        message: impl Into<String>,
    ) -> Self {
        GcsError::OperationFailed {
            uri: uri.into(),
            operation,
            message: message.into(),
        }
    }

    /// Create a new authentication error.
    pub fn auth_error(message: impl Into<String>) -> Self {
        GcsError::AuthError(message.into())
    }

    /// Whether the object was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GcsError::NotFound { .. })
    }

    /// Whether the caller was denied access.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, GcsError::Forbidden { .. })
    }
}

/// Authentication errors.
///
/// These errors occur during authentication with Google Cloud services
/// using Application Default Credentials (ADC).
#[derive(Debug, Error)]
pub enum AuthError {
    /// ADC is not configured
    #[error("ADC not configured. Run 'gcloud auth application-default login' or set GOOGLE_APPLICATION_CREDENTIALS")]
    NotConfigured,

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

impl AuthError {
    /// Create a new token refresh failed error.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        AuthError::RefreshFailed(message.into())
    }
}
