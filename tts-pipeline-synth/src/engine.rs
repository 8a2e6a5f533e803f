//! Synthesis engine abstraction and the HTTP-backed production engine.
//!
//! The model itself is opaque to the trigger: an engine turns text and a
//! speaker id into a waveform file. [`HttpEngineLoader`] loads engines from a
//! model-serving backend that keeps the weights resident.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::speaker::{SpeakerId, SpeakerRegistry};

/// Engine failures.
///
/// `Clone` so a single failed load can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine for a language could not be loaded
    #[error("Failed to load engine for language {language}: {message}")]
    Load {
        /// Language code that was being loaded
        language: String,
        /// Description of the failure
        message: String,
    },

    /// Synthesis of a single request failed
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
}

impl EngineError {
    /// Create a new load error.
    pub fn load(language: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Load {
            language: language.into(),
            message: message.into(),
        }
    }

    /// Create a new synthesis error.
    pub fn synthesis(message: impl Into<String>) -> Self {
        EngineError::Synthesis(message.into())
    }
}

/// A loaded text-to-speech model for one language.
///
/// Immutable after load; shared across concurrent invocations.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Language code this engine was loaded for.
    fn language(&self) -> &str;

    /// Voices the engine offers, if it reports any.
    fn speakers(&self) -> Option<&SpeakerRegistry>;

    /// Synthesize `text` with `speaker_id` into a WAV file at `output`.
    async fn synthesize_to_file(
        &self,
        text: &str,
        speaker_id: SpeakerId,
        output: &Path,
        speed: f32,
    ) -> Result<(), EngineError>;
}

/// Shared handle to a loaded engine.
pub type EngineHandle = Arc<dyn SynthesisEngine>;

/// Loads engines; may take seconds to minutes per language.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self, language: &str, device: &str) -> Result<EngineHandle, EngineError>;
}

// =============================================================================
// Backend Request/Response Types
// =============================================================================

/// Speaker list returned by the backend for a language.
#[derive(Debug, Deserialize)]
pub struct SpeakersResponse {
    /// Speakers in the backend's order; absent when the model has none
    #[serde(default)]
    pub speakers: Option<Vec<SpeakerEntry>>,
}

/// One speaker entry.
#[derive(Debug, Deserialize)]
pub struct SpeakerEntry {
    pub name: String,
    pub id: SpeakerId,
}

/// Synthesis request body.
#[derive(Debug, Serialize)]
pub struct SynthesizeRequest<'a> {
    pub language: &'a str,
    pub text: &'a str,
    pub speaker_id: SpeakerId,
    pub speed: f32,
    pub device: &'a str,
}

/// Synthesis response body.
#[derive(Debug, Deserialize)]
pub struct SynthesizeResponse {
    /// Base64-encoded WAV content
    pub audio_content: String,
}

// =============================================================================
// HTTP Engine
// =============================================================================

/// Loads engines from a model-serving backend.
pub struct HttpEngineLoader {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEngineLoader {
    /// Create a loader for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn speakers_endpoint(&self, language: &str) -> String {
        format!(
            "{}/v1/languages/{}/speakers",
            self.base_url,
            urlencoding::encode(language)
        )
    }
}

#[async_trait]
impl EngineLoader for HttpEngineLoader {
    #[instrument(level = "debug", name = "http_engine_load", skip(self))]
    async fn load(&self, language: &str, device: &str) -> Result<EngineHandle, EngineError> {
        let endpoint = self.speakers_endpoint(language);
        debug!(endpoint = %endpoint, "Requesting speaker registry");

        let response = self
            .http
            .get(&endpoint)
            .query(&[("device", device)])
            .send()
            .await
            .map_err(|e| EngineError::load(language, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::load(
                language,
                format!("Backend returned HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let parsed: SpeakersResponse = response
            .json()
            .await
            .map_err(|e| EngineError::load(language, format!("Failed to parse speaker list: {}", e)))?;

        let speakers = parsed
            .speakers
            .map(|entries| entries.into_iter().map(|s| (s.name, s.id)).collect());

        let engine: EngineHandle = Arc::new(HttpEngine {
            http: self.http.clone(),
            endpoint: format!("{}/v1/synthesize", self.base_url),
            language: language.to_string(),
            device: device.to_string(),
            speakers,
        });
        Ok(engine)
    }
}

/// Engine whose weights live in the backend process.
pub struct HttpEngine {
    http: reqwest::Client,
    endpoint: String,
    language: String,
    device: String,
    speakers: Option<SpeakerRegistry>,
}

#[async_trait]
impl SynthesisEngine for HttpEngine {
    fn language(&self) -> &str {
        &self.language
    }

    fn speakers(&self) -> Option<&SpeakerRegistry> {
        self.speakers.as_ref()
    }

    #[instrument(level = "debug", name = "http_engine_synthesize", skip(self, text, output))]
    async fn synthesize_to_file(
        &self,
        text: &str,
        speaker_id: SpeakerId,
        output: &Path,
        speed: f32,
    ) -> Result<(), EngineError> {
        let request = SynthesizeRequest {
            language: &self.language,
            text,
            speaker_id,
            speed,
            device: &self.device,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::synthesis(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::synthesis(format!(
                "Backend returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::synthesis(format!("Failed to parse response: {}", e)))?;

        if parsed.audio_content.is_empty() {
            return Err(EngineError::synthesis("No audio content returned from backend"));
        }

        let audio = BASE64
            .decode(&parsed.audio_content)
            .map_err(|e| EngineError::synthesis(format!("Invalid base64 audio: {}", e)))?;

        tokio::fs::write(output, &audio)
            .await
            .map_err(|e| EngineError::synthesis(format!("Failed to write {}: {}", output.display(), e)))?;

        debug!(bytes = audio.len(), path = %output.display(), "Wrote waveform");
        Ok(())
    }
}
