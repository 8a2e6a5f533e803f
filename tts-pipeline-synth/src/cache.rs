//! Process-wide synthesis engine cache.
//!
//! One slot per language. Each slot is an exactly-once initializer: the first
//! caller for an uncached language runs the load while concurrent callers for
//! the same language wait on it and receive the same handle, or the same
//! error. A failed slot is discarded once its waiters have been served, so a
//! later invocation retries the load. Successful entries are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::engine::{EngineError, EngineHandle, EngineLoader};

type Slot = Arc<OnceCell<Result<EngineHandle, EngineError>>>;

/// Lazily populated map from language code to loaded engine.
pub struct EngineCache {
    loader: Arc<dyn EngineLoader>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl EngineCache {
    /// Create an empty cache that loads engines with `loader`.
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the engine for `language`, loading it on first use.
    ///
    /// Language codes are case-insensitive.
    pub async fn get_engine(&self, language: &str, device: &str) -> Result<EngineHandle, EngineError> {
        let key = language.to_uppercase();
        let slot = self.slot(&key);

        let result = slot
            .get_or_init(|| async {
                info!(language = %key, device, "Loading synthesis engine");
                let started = Instant::now();
                let loaded = self.loader.load(&key, device).await;
                match &loaded {
                    Ok(_) => info!(
                        language = %key,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Synthesis engine loaded"
                    ),
                    Err(e) => error!(language = %key, error = %e, "Synthesis engine load failed"),
                }
                loaded
            })
            .await
            .clone();

        if result.is_err() {
            self.discard_failed(&key, &slot);
        }
        result
    }

    /// Engine for `language` if it has already loaded successfully.
    pub fn cached(&self, language: &str) -> Option<EngineHandle> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&language.to_uppercase())
            .and_then(|slot| slot.get())
            .and_then(|result| result.as_ref().ok())
            .cloned()
    }

    /// Languages with a successfully loaded engine.
    pub fn loaded_languages(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut languages: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot.get(), Some(Ok(_))))
            .map(|(language, _)| language.clone())
            .collect();
        languages.sort();
        languages
    }

    /// Warm the cache with `languages`.
    ///
    /// Failures are logged and skipped. Returns the number of languages that
    /// are ready afterwards.
    pub async fn preload(&self, languages: &[String], device: &str) -> usize {
        info!(?languages, device, "Preloading synthesis engines");
        let mut ready = 0;
        for language in languages.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            match self.get_engine(language, device).await {
                Ok(_) => ready += 1,
                Err(e) => error!(language, error = %e, "Could not preload synthesis engine"),
            }
        }
        info!(ready, requested = languages.len(), "Preloading finished");
        ready
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.to_string()).or_default().clone()
    }

    fn discard_failed(&self, key: &str, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Only remove the slot we observed; a retry may already have replaced it.
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }
}
