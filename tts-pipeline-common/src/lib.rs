//! TTS Pipeline Common Library
//!
//! Shared utilities for configuration, object storage, authentication,
//! error handling, tracing and HTTP serving used by the pipeline's triggers.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod auth;
pub mod config;
pub mod error;
pub mod gcs;
pub mod server;
pub mod tracing;


pub use config::Config;
pub use error::{AuthError, ConfigError, GcsError, GcsOperation};
pub use gcs::{GcsClient, GcsUri, ObjectStore};
pub use server::{HttpServer, ServerError, shutdown_channel};
