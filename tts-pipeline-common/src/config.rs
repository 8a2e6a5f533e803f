//! Configuration module for loading environment variables and settings.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default synthesis language.
pub const DEFAULT_LANGUAGE: &str = "EN";

/// Default speech rate.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Default device hint for engine loads.
pub const DEFAULT_DEVICE: &str = "cpu";

/// Default base URL of the synthesis backend.
pub const DEFAULT_SYNTHESIS_URL: &str = "http://127.0.0.1:8888";

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Destination bucket for synthesized audio (required)
    pub output_bucket: String,
    /// Language code used for synthesis, upper-cased
    pub target_language: String,
    /// Speech rate passed to the engine
    pub target_speed: f32,
    /// Device hint forwarded to engine loads
    pub device: String,
    /// Base URL of the synthesis backend
    pub synthesis_url: String,
    /// Upper bound on concurrent synthesis calls in this process
    pub max_concurrent_syntheses: Option<usize>,
    /// Languages to warm into the engine cache at startup
    pub preload_languages: Vec<String>,
    /// Directory for invocation-scoped temporary files
    pub scratch_dir: Option<PathBuf>,
    /// Storage emulator base URL; when set, storage calls skip ADC
    pub storage_emulator_host: Option<String>,
    /// HTTP server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if OUTPUT_BUCKET_NAME is not set,
    /// or `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let output_bucket =
            get("OUTPUT_BUCKET_NAME").ok_or_else(|| ConfigError::missing_env_var("OUTPUT_BUCKET_NAME"))?;

        let target_language = get("TARGET_LANGUAGE")
            .map(|l| l.to_uppercase())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let target_speed = match get("TARGET_SPEED") {
            Some(raw) => {
                let speed: f32 = raw
                    .parse()
                    .map_err(|_| ConfigError::invalid_value("TARGET_SPEED", format!("'{}' is not a number", raw)))?;
                if !(speed.is_finite() && speed > 0.0) {
                    return Err(ConfigError::invalid_value(
                        "TARGET_SPEED",
                        format!("must be a positive number, got {}", speed),
                    ));
                }
                speed
            }
            None => DEFAULT_SPEED,
        };

        let device = get("DEVICE").unwrap_or_else(|| DEFAULT_DEVICE.to_string());

        let synthesis_url = get("SYNTHESIS_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SYNTHESIS_URL.to_string());

        let max_concurrent_syntheses = match get("MAX_CONCURRENT_SYNTHESES") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::invalid_value(
                        "MAX_CONCURRENT_SYNTHESES",
                        format!("must be a positive integer, got '{}'", raw),
                    ));
                }
                Ok(n) => Some(n),
            },
            None => None,
        };

        let preload_languages = get("PRELOAD_LANGUAGES")
            .map(|raw| parse_language_list(&raw))
            .unwrap_or_default();

        let scratch_dir = get("SCRATCH_DIR").map(PathBuf::from);

        let storage_emulator_host = get("STORAGE_EMULATOR_HOST")
            .map(|h| h.trim_end_matches('/').to_string());

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid_value("PORT", format!("'{}' is not a valid port", raw)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            output_bucket,
            target_language,
            target_speed,
            device,
            synthesis_url,
            max_concurrent_syntheses,
            preload_languages,
            scratch_dir,
            storage_emulator_host,
            port,
        })
    }

    /// Directory for invocation-scoped temporary files.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Split a comma-separated language list, dropping blanks and upper-casing.
pub fn parse_language_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_uppercase)
        .collect()
}
