//! TTS Pipeline Synthesis Trigger
//!
//! HTTP service receiving storage notifications for text objects and
//! publishing synthesized speech to the output bucket.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tts_pipeline_common::gcs::ObjectStore;
use tts_pipeline_common::tracing::init_tracing;
use tts_pipeline_common::{Config, GcsClient, HttpServer};
use tts_pipeline_synth::{EngineCache, HttpEngineLoader, TriggerHandler, TriggerSettings, router};

#[derive(Parser, Debug)]
#[command(name = "tts-pipeline-synth")]
#[command(about = "Storage-triggered text-to-speech synthesis service")]
struct Args {
    /// Port to listen on (overrides PORT from the configuration)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Skip warming the engines listed in PRELOAD_LANGUAGES
    #[arg(long)]
    no_preload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("tts-pipeline-synth starting...");

    let args = Args::parse();
    let config = Config::from_env()?;
    tracing::info!(
        output_bucket = %config.output_bucket,
        language = %config.target_language,
        device = %config.device,
        speed = config.target_speed,
        "Configuration loaded"
    );

    let store: Arc<dyn ObjectStore> = match &config.storage_emulator_host {
        Some(host) => {
            tracing::info!(host = %host, "Using storage emulator");
            Arc::new(GcsClient::emulator(host.clone()))
        }
        None => Arc::new(GcsClient::new().await?),
    };

    let engines = Arc::new(EngineCache::new(Arc::new(HttpEngineLoader::new(
        config.synthesis_url.clone(),
    ))));
    if !args.no_preload && !config.preload_languages.is_empty() {
        engines.preload(&config.preload_languages, &config.device).await;
    }

    let handler = Arc::new(TriggerHandler::new(TriggerSettings::from(&config), store, engines));

    HttpServer::new(router(handler))
        .with_port(args.port.unwrap_or(config.port))
        .run()
        .await?;

    Ok(())
}
