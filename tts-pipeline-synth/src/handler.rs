//! Synthesis trigger handler.
//!
//! Turns one storage notification into one uploaded audio object:
//! validate the envelope, fetch the text, obtain the language's engine,
//! resolve a speaker, synthesize into a scratch file, upload, clean up.
//!
//! Conditions a retry cannot change come back as [`Outcome::Skipped`] and are
//! acknowledged. Everything else is a [`TriggerError`], which the HTTP layer
//! turns into a non-ack so the platform retries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempPath;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{Span, debug, error, info, instrument, warn};
use tts_pipeline_common::config::Config;
use tts_pipeline_common::error::GcsError;
use tts_pipeline_common::gcs::{GcsUri, ObjectStore};

use crate::cache::EngineCache;
use crate::engine::EngineError;
use crate::event::{AUDIO_SUFFIX, ObjectEvent, derive_output_key};
use crate::speaker::resolve_speaker;

/// Acknowledged conditions that a retry cannot change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The notification lacked `bucket` or `name`
    MalformedEvent,
    /// The object is not a text file
    UnsupportedFileType,
    /// The source object no longer exists
    SourceNotFound,
    /// The source object is empty after trimming
    EmptyInput,
}

impl SkipReason {
    /// Response text reported back to the platform.
    pub fn message(&self) -> &'static str {
        match self {
            SkipReason::MalformedEvent => "Malformed event data",
            SkipReason::UnsupportedFileType => "Not a TXT file, skipping.",
            SkipReason::SourceNotFound => "Source file not found.",
            SkipReason::EmptyInput => "Source file is empty, skipping.",
        }
    }
}

/// Result of an acknowledged invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Audio was synthesized and uploaded to `output`
    Synthesized { output: GcsUri },
    /// The event was acknowledged without synthesis
    Skipped(SkipReason),
}

impl Outcome {
    /// Response text reported back to the platform.
    pub fn message(&self) -> String {
        match self {
            Outcome::Synthesized { output } => format!("Synthesized audio to {}", output),
            Outcome::Skipped(reason) => reason.message().to_string(),
        }
    }

    /// HTTP status for the outcome; every outcome is an acknowledgement.
    pub fn status_code(&self) -> u16 {
        200
    }
}

/// Failures surfaced to the platform so it can retry the event.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Reading the source was denied
    #[error("Permission denied reading source: {0}")]
    StoreForbidden(#[source] GcsError),

    /// Reading the source failed for another reason
    #[error("Storage error reading source: {0}")]
    StoreTransport(#[source] GcsError),

    /// The language's engine could not be loaded
    #[error("Engine unavailable: {0}")]
    EngineLoad(#[source] EngineError),

    /// The engine failed to synthesize
    #[error("Synthesis error: {0}")]
    Synthesis(#[source] EngineError),

    /// Uploading the audio failed
    #[error("Upload failed: {0}")]
    Upload(#[source] GcsError),

    /// The scratch file could not be allocated
    #[error("Scratch file error: {0}")]
    Scratch(#[source] std::io::Error),
}

impl TriggerError {
    /// Short machine-readable class name.
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerError::StoreForbidden(_) => "store_forbidden",
            TriggerError::StoreTransport(_) => "store_transport",
            TriggerError::EngineLoad(_) => "engine_load",
            TriggerError::Synthesis(_) => "synthesis",
            TriggerError::Upload(_) => "upload",
            TriggerError::Scratch(_) => "scratch",
        }
    }

    /// Whether an immediate retry could plausibly succeed.
    ///
    /// Permission and engine-load failures need an operator fix or redeploy
    /// first; they are still surfaced so the platform's retry picks up the fix.
    pub fn is_transient(&self) -> bool {
        match self {
            TriggerError::StoreForbidden(_) | TriggerError::EngineLoad(_) => false,
            TriggerError::Upload(e) => !e.is_forbidden(),
            TriggerError::StoreTransport(_) | TriggerError::Synthesis(_) | TriggerError::Scratch(_) => true,
        }
    }
}

/// Per-process settings the handler needs from [`Config`].
#[derive(Debug, Clone)]
pub struct TriggerSettings {
    pub output_bucket: String,
    pub language: String,
    pub speed: f32,
    pub device: String,
    pub scratch_dir: PathBuf,
    pub max_concurrent_syntheses: Option<usize>,
}

impl From<&Config> for TriggerSettings {
    fn from(config: &Config) -> Self {
        Self {
            output_bucket: config.output_bucket.clone(),
            language: config.target_language.clone(),
            speed: config.target_speed,
            device: config.device.clone(),
            scratch_dir: config.scratch_dir(),
            max_concurrent_syntheses: config.max_concurrent_syntheses,
        }
    }
}

/// Invocation-scoped output file, deleted when dropped.
struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    fn create_in(dir: &Path) -> std::io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("synth-")
            .suffix(AUDIO_SUFFIX)
            .tempfile_in(dir)?;
        // Close our handle so the engine can write the path freely.
        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "Removed scratch file"),
                // Already gone counts as cleaned up.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %shown, error = %e, "Failed to remove scratch file"),
            }
        }
    }
}

/// Handles storage notifications for text objects.
pub struct TriggerHandler {
    settings: TriggerSettings,
    store: Arc<dyn ObjectStore>,
    engines: Arc<EngineCache>,
    synthesis_permits: Option<Arc<Semaphore>>,
}

impl TriggerHandler {
    /// Create a handler sharing `store` and `engines` with other invocations.
    pub fn new(settings: TriggerSettings, store: Arc<dyn ObjectStore>, engines: Arc<EngineCache>) -> Self {
        let synthesis_permits = settings
            .max_concurrent_syntheses
            .map(|n| Arc::new(Semaphore::new(n)));
        Self {
            settings,
            store,
            engines,
            synthesis_permits,
        }
    }

    pub fn settings(&self) -> &TriggerSettings {
        &self.settings
    }

    pub fn engines(&self) -> &EngineCache {
        &self.engines
    }

    /// Process one notification payload.
    #[instrument(
        level = "info",
        name = "synthesis_trigger",
        skip(self, payload),
        fields(bucket = tracing::field::Empty, object = tracing::field::Empty)
    )]
    pub async fn handle(&self, payload: &Value) -> Result<Outcome, TriggerError> {
        let Some(event) = ObjectEvent::from_payload(payload) else {
            warn!(%payload, "Malformed event data, missing 'bucket' or 'name'");
            return Ok(Outcome::Skipped(SkipReason::MalformedEvent));
        };

        let span = Span::current();
        span.record("bucket", event.bucket.as_str());
        span.record("object", event.name.as_str());

        let source = GcsUri::new(&event.bucket, &event.name);
        info!(%source, "Received event");

        if !event.is_text_object() {
            info!(%source, "Not a text file, skipping");
            return Ok(Outcome::Skipped(SkipReason::UnsupportedFileType));
        }

        let text = match self.fetch_text(&source).await? {
            Some(text) => text,
            None => return Ok(Outcome::Skipped(SkipReason::SourceNotFound)),
        };

        if text.is_empty() {
            info!(%source, "Source file is empty, skipping");
            return Ok(Outcome::Skipped(SkipReason::EmptyInput));
        }

        let engine = self
            .engines
            .get_engine(&self.settings.language, &self.settings.device)
            .await
            .map_err(|e| {
                error!(error = %e, "Engine load failed");
                TriggerError::EngineLoad(e)
            })?;

        let speaker_id = resolve_speaker(engine.speakers(), &self.settings.language);
        debug!(speaker_id, "Resolved speaker");

        let scratch = ScratchFile::create_in(&self.settings.scratch_dir).map_err(|e| {
            error!(dir = %self.settings.scratch_dir.display(), error = %e, "Could not allocate scratch file");
            TriggerError::Scratch(e)
        })?;

        {
            let _permit = match &self.synthesis_permits {
                Some(permits) => Some(
                    permits
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| TriggerError::Synthesis(EngineError::synthesis(e.to_string())))?,
                ),
                None => None,
            };

            info!(chars = text.chars().count(), speaker_id, "Synthesizing speech");
            engine
                .synthesize_to_file(&text, speaker_id, scratch.path(), self.settings.speed)
                .await
                .map_err(|e| {
                    error!(error = %e, "Synthesis failed");
                    TriggerError::Synthesis(e)
                })?;
        }

        let output = GcsUri::new(&self.settings.output_bucket, derive_output_key(&event.name));
        self.store
            .write_bytes(scratch.path(), &output)
            .await
            .map_err(|e| {
                error!(%output, error = %e, "Upload failed");
                TriggerError::Upload(e)
            })?;

        drop(scratch);

        info!(%source, %output, "Synthesized and uploaded audio");
        Ok(Outcome::Synthesized { output })
    }

    /// Read the source text; `None` when it no longer exists.
    async fn fetch_text(&self, source: &GcsUri) -> Result<Option<String>, TriggerError> {
        let classify = |e: GcsError| {
            if e.is_forbidden() {
                error!(%source, error = %e, "Permission denied reading source");
                TriggerError::StoreForbidden(e)
            } else {
                error!(%source, error = %e, "Storage error reading source");
                TriggerError::StoreTransport(e)
            }
        };

        if !self.store.exists(source).await.map_err(classify)? {
            warn!(%source, "Source file not found");
            return Ok(None);
        }

        match self.store.read_text(source).await {
            Ok(text) => Ok(Some(text)),
            // Deleted between the existence check and the read.
            Err(e) if e.is_not_found() => {
                warn!(%source, "Source file not found");
                Ok(None)
            }
            Err(e) => Err(classify(e)),
        }
    }
}
