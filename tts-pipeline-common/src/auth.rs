//! Authentication module using Application Default Credentials.
//!
//! Storage calls authenticate with ADC (Application Default Credentials):
//! - Service account credentials via `GOOGLE_APPLICATION_CREDENTIALS`
//! - User credentials from `gcloud auth application-default login`
//! - GCE metadata server for workloads running on Google Cloud
//!
//! A static token source is available for storage emulators and tests.

use std::sync::Arc;

use gcp_auth::TokenProvider;
use tracing::{debug, instrument};

use crate::error::AuthError;

enum TokenSource {
    /// Production token provider from gcp_auth
    Provider(Arc<dyn TokenProvider>),
    /// Fixed token, never refreshed
    Static(String),
}

/// Authentication provider.
///
/// Wraps the `gcp_auth` crate to provide automatic credential discovery and token refresh.
/// Tokens are cached internally and refreshed automatically when they expire.
pub struct AuthProvider {
    source: TokenSource,
}

impl AuthProvider {
    /// Create a new auth provider using Application Default Credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotConfigured` if no valid credentials can be found.
    #[instrument(level = "debug", name = "auth_provider_new")]
    pub async fn new() -> Result<Self, AuthError> {
        debug!("Initializing AuthProvider with ADC");

        let provider = gcp_auth::provider().await.map_err(|e| {
            debug!("Failed to initialize ADC: {}", e);
            AuthError::NotConfigured
        })?;

        debug!("AuthProvider initialized successfully");
        Ok(Self {
            source: TokenSource::Provider(provider),
        })
    }

    /// Create a provider that always hands out `token`.
    ///
    /// Used against storage emulators, which accept any bearer token.
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
        }
    }

    /// Get a valid access token for the specified scopes.
    ///
    /// The caller should not cache tokens themselves.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RefreshFailed` if the token cannot be obtained or refreshed.
    #[instrument(level = "debug", name = "get_token", skip(self))]
    pub async fn get_token(&self, scopes: &[&str]) -> Result<String, AuthError> {
        match &self.source {
            TokenSource::Provider(provider) => {
                let token = provider.token(scopes).await.map_err(|e| {
                    debug!("Token refresh failed: {}", e);
                    AuthError::refresh_failed(e.to_string())
                })?;

                Ok(token.as_str().to_string())
            }
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }
}

/// OAuth2 scopes used by the storage gateway.
pub mod scopes {
    /// Read/write access to Google Cloud Storage.
    pub const DEVSTORAGE_READ_WRITE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

    /// Read-only access to Google Cloud Storage.
    pub const DEVSTORAGE_READ_ONLY: &str = "https://www.googleapis.com/auth/devstorage.read_only";
}
