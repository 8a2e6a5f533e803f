//! Object-store gateway backed by Google Cloud Storage.
//!
//! [`ObjectStore`] is the seam the triggers depend on; [`GcsClient`] implements
//! it against the GCS JSON API.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::{AuthProvider, scopes};
use crate::error::{GcsError, GcsOperation};

/// Production GCS endpoint.
pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Content type attached to uploaded audio.
pub const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Parsed GCS URI components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsUri {
    /// Bucket name
    pub bucket: String,
    /// Object path within the bucket
    pub object: String,
}

impl GcsUri {
    /// Build a URI from bucket and object names.
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for GcsUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

/// Storage operations needed by the triggers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object as UTF-8 text with surrounding whitespace trimmed.
    ///
    /// # Errors
    /// `GcsError::NotFound` if the object does not exist, `GcsError::Forbidden`
    /// if read access is denied, `GcsError::OperationFailed` otherwise.
    async fn read_text(&self, uri: &GcsUri) -> Result<String, GcsError>;

    /// Upload the file at `local_path` to `uri`.
    ///
    /// # Errors
    /// `GcsError::Forbidden` if write access is denied,
    /// `GcsError::OperationFailed` otherwise.
    async fn write_bytes(&self, local_path: &Path, uri: &GcsUri) -> Result<(), GcsError>;

    /// Check whether an object exists.
    async fn exists(&self, uri: &GcsUri) -> Result<bool, GcsError>;
}

/// GCS operations client.
pub struct GcsClient {
    client: reqwest::Client,
    auth: AuthProvider,
    base_url: String,
}

impl GcsClient {
    /// Create a new GCS client using Application Default Credentials.
    ///
    /// # Errors
    /// Returns `GcsError::AuthError` if authentication setup fails.
    pub async fn new() -> Result<Self, GcsError> {
        let auth = AuthProvider::new()
            .await
            .map_err(|e| GcsError::auth_error(e.to_string()))?;

        Ok(Self::with_auth(auth))
    }

    /// Create a new GCS client with a provided auth provider.
    pub fn with_auth(auth: AuthProvider) -> Self {
        Self::with_base_url(auth, GCS_BASE_URL.to_string())
    }

    /// Create a new GCS client against a custom endpoint (emulators, tests).
    pub fn with_base_url(auth: AuthProvider, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client for a storage emulator, which accepts any bearer token.
    pub fn emulator(base_url: String) -> Self {
        Self::with_base_url(AuthProvider::static_token("emulator"), base_url)
    }

    fn object_url(&self, uri: &GcsUri) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            uri.bucket,
            urlencoding::encode(&uri.object)
        )
    }

    async fn token(&self, scope: &str) -> Result<String, GcsError> {
        self.auth
            .get_token(&[scope])
            .await
            .map_err(|e| GcsError::auth_error(e.to_string()))
    }
}

/// Map a non-success response to the gateway's error classes.
async fn classify_failure(
    response: reqwest::Response,
    uri: &GcsUri,
    operation: GcsOperation,
) -> GcsError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    match status {
        404 => GcsError::not_found(uri.to_string()),
        401 | 403 => GcsError::forbidden(uri.to_string(), operation, format!("status {}: {}", status, body)),
        _ => GcsError::operation_failed(
            uri.to_string(),
            operation,
            format!("Failed with status {}: {}", status, body),
        ),
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn read_text(&self, uri: &GcsUri) -> Result<String, GcsError> {
        let token = self.token(scopes::DEVSTORAGE_READ_ONLY).await?;
        let url = format!("{}?alt=media", self.object_url(uri));

        debug!(%uri, "Reading object");
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                GcsError::operation_failed(uri.to_string(), GcsOperation::Read, format!("Read request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(classify_failure(response, uri, GcsOperation::Read).await);
        }

        let bytes = response.bytes().await.map_err(|e| {
            GcsError::operation_failed(
                uri.to_string(),
                GcsOperation::Read,
                format!("Failed to read response body: {}", e),
            )
        })?;

        let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
            GcsError::operation_failed(uri.to_string(), GcsOperation::Read, format!("Object is not valid UTF-8: {}", e))
        })?;

        Ok(text.trim().to_string())
    }

    async fn write_bytes(&self, local_path: &Path, uri: &GcsUri) -> Result<(), GcsError> {
        let data = tokio::fs::read(local_path).await.map_err(|e| {
            GcsError::operation_failed(
                uri.to_string(),
                GcsOperation::Write,
                format!("Failed to read local file {}: {}", local_path.display(), e),
            )
        })?;

        let token = self.token(scopes::DEVSTORAGE_READ_WRITE).await?;
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            uri.bucket,
            urlencoding::encode(&uri.object)
        );

        debug!(%uri, bytes = data.len(), "Uploading object");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", AUDIO_CONTENT_TYPE)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                GcsError::operation_failed(uri.to_string(), GcsOperation::Write, format!("Upload request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(match classify_failure(response, uri, GcsOperation::Write).await {
                // A missing destination bucket is a transport-class failure for writes.
                GcsError::NotFound { uri } => {
                    GcsError::operation_failed(uri, GcsOperation::Write, "Destination bucket not found")
                }
                other => other,
            });
        }

        Ok(())
    }

    async fn exists(&self, uri: &GcsUri) -> Result<bool, GcsError> {
        let token = self.token(scopes::DEVSTORAGE_READ_ONLY).await?;

        let response = self
            .client
            .get(self.object_url(uri))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                GcsError::operation_failed(
                    uri.to_string(),
                    GcsOperation::Exists,
                    format!("Exists check request failed: {}", e),
                )
            })?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(classify_failure(response, uri, GcsOperation::Exists).await),
        }
    }
}
