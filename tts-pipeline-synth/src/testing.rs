//! In-process fakes for the storage gateway and the synthesis engine.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tts_pipeline_common::error::{GcsError, GcsOperation};
use tts_pipeline_common::gcs::{GcsUri, ObjectStore};

use crate::engine::{EngineError, EngineHandle, EngineLoader, SynthesisEngine};
use crate::speaker::{SpeakerId, SpeakerRegistry};

/// Log output captured by [`capture_logs`].
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

/// Waveform bytes every fake synthesis writes.
pub const FAKE_WAVEFORM: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt fake-waveform";

/// Failure a fake store can be told to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    Forbidden,
    Transport,
}

impl StoreFailure {
    fn to_error(self, uri: &GcsUri, operation: GcsOperation) -> GcsError {
        match self {
            StoreFailure::Forbidden => GcsError::forbidden(uri.to_string(), operation, "denied"),
            StoreFailure::Transport => GcsError::operation_failed(uri.to_string(), operation, "connection reset"),
        }
    }
}

/// Object store backed by a map, with call counters and failure injection.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    /// Objects that `exists` reports but `read_text` no longer finds.
    vanished: Mutex<HashSet<(String, String)>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub exists_calls: AtomicUsize,
    pub read_failure: Mutex<Option<StoreFailure>>,
    pub write_failure: Mutex<Option<StoreFailure>>,
    /// Local paths handed to `write_bytes`.
    pub uploaded_from: Mutex<Vec<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, content: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), content.into());
    }

    /// Make `exists` succeed while the read reports not-found.
    pub fn put_vanishing(&self, bucket: &str, key: &str) {
        self.vanished
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()));
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn fail_reads(&self, failure: StoreFailure) {
        *self.read_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_writes(&self, failure: StoreFailure) {
        *self.write_failure.lock().unwrap() = Some(failure);
    }

    fn key(uri: &GcsUri) -> (String, String) {
        (uri.bucket.clone(), uri.object.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn read_text(&self, uri: &GcsUri) -> Result<String, GcsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.read_failure.lock().unwrap() {
            return Err(failure.to_error(uri, GcsOperation::Read));
        }
        let bytes = self
            .get(&uri.bucket, &uri.object)
            .ok_or_else(|| GcsError::not_found(uri.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| GcsError::operation_failed(uri.to_string(), GcsOperation::Read, e.to_string()))?;
        Ok(text.trim().to_string())
    }

    async fn write_bytes(&self, local_path: &Path, uri: &GcsUri) -> Result<(), GcsError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.uploaded_from.lock().unwrap().push(local_path.to_path_buf());
        if let Some(failure) = *self.write_failure.lock().unwrap() {
            return Err(failure.to_error(uri, GcsOperation::Write));
        }
        let data = std::fs::read(local_path)
            .map_err(|e| GcsError::operation_failed(uri.to_string(), GcsOperation::Write, e.to_string()))?;
        self.objects.lock().unwrap().insert(Self::key(uri), data);
        Ok(())
    }

    async fn exists(&self, uri: &GcsUri) -> Result<bool, GcsError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.read_failure.lock().unwrap() {
            return Err(failure.to_error(uri, GcsOperation::Exists));
        }
        let key = Self::key(uri);
        Ok(self.objects.lock().unwrap().contains_key(&key) || self.vanished.lock().unwrap().contains(&key))
    }
}

/// A synthesis call observed by [`FakeEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisCall {
    pub text: String,
    pub speaker_id: SpeakerId,
    pub speed: f32,
    pub output: PathBuf,
}

/// Engine that writes [`FAKE_WAVEFORM`] and records its calls.
pub struct FakeEngine {
    language: String,
    speakers: Option<SpeakerRegistry>,
    fail: bool,
    delay: Duration,
    in_flight: AtomicUsize,
    /// Highest number of syntheses observed running at once.
    pub peak_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<SynthesisCall>>,
}

impl FakeEngine {
    pub fn new(language: &str, speakers: Option<SpeakerRegistry>) -> Self {
        Self {
            language: language.to_string(),
            speakers,
            fail: false,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Hold each synthesis open for `delay` so overlapping calls are observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SynthesisEngine for FakeEngine {
    fn language(&self) -> &str {
        &self.language
    }

    fn speakers(&self) -> Option<&SpeakerRegistry> {
        self.speakers.as_ref()
    }

    async fn synthesize_to_file(
        &self,
        text: &str,
        speaker_id: SpeakerId,
        output: &Path,
        speed: f32,
    ) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(SynthesisCall {
            text: text.to_string(),
            speaker_id,
            speed,
            output: output.to_path_buf(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        // Write before failing so cleanup of partial output is exercised.
        let written = std::fs::write(output, FAKE_WAVEFORM);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        written.map_err(|e| EngineError::synthesis(e.to_string()))?;

        if self.fail {
            return Err(EngineError::synthesis("model forward pass failed"));
        }
        Ok(())
    }
}

/// Loader counting its loads; can be slowed down or made to fail.
pub struct FakeLoader {
    pub loads: AtomicUsize,
    delay: Duration,
    failing: AtomicBool,
    failing_for: Option<String>,
    speakers: Option<SpeakerRegistry>,
    engine: Option<Arc<FakeEngine>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            failing_for: None,
            speakers: Some([("EN-Default", 3), ("EN-Other", 7)].into_iter().collect()),
            engine: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn failing_for(mut self, language: &str) -> Self {
        self.failing_for = Some(language.to_string());
        self
    }

    pub fn with_speakers(mut self, speakers: Option<SpeakerRegistry>) -> Self {
        self.speakers = speakers;
        self
    }

    /// Serve this engine for every load, so tests can inspect its calls.
    pub fn with_engine(mut self, engine: Arc<FakeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    async fn load(&self, language: &str, _device: &str) -> Result<EngineHandle, EngineError> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) || self.failing_for.as_deref() == Some(language) {
            return Err(EngineError::load(language, format!("weights unavailable (attempt {})", attempt)));
        }
        match &self.engine {
            Some(engine) => Ok(engine.clone() as EngineHandle),
            None => Ok(Arc::new(FakeEngine::new(language, self.speakers.clone())) as EngineHandle),
        }
    }
}
