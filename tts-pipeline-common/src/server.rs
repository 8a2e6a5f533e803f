//! HTTP server runner for event-triggered services.
//!
//! The hosting platform delivers storage notifications as HTTP requests; a
//! trigger builds an `axum::Router` and hands it to [`HttpServer`], which
//! binds the port and shuts down gracefully on SIGTERM/SIGINT or a
//! programmatic shutdown channel.
//!
//! # Example
//!
//! ```ignore
//! use tts_pipeline_common::server::HttpServer;
//!
//! HttpServer::new(router)
//!     .with_port(8080)
//!     .run()
//!     .await?;
//! ```

use thiserror::Error;
use tokio::sync::oneshot;

/// Errors that can occur when running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified port
    #[error("Failed to bind to port {port}: {message}")]
    BindFailed { port: u16, message: String },

    /// Error while serving connections
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Builder for configuring and running the HTTP server.
pub struct HttpServer {
    router: axum::Router,
    port: u16,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl HttpServer {
    /// Create a new server for the given router on port 8080.
    pub fn new(router: axum::Router) -> Self {
        Self {
            router,
            port: crate::config::DEFAULT_PORT,
            shutdown_rx: None,
        }
    }

    /// Set the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set a shutdown signal receiver for graceful shutdown.
    ///
    /// When the sender is dropped or a message is sent, the server
    /// will initiate graceful shutdown.
    pub fn with_shutdown(mut self, shutdown_rx: oneshot::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Run the server until shutdown; in-flight requests are allowed to finish.
    pub async fn run(self) -> Result<(), ServerError> {
        let port = self.port;
        let bind_addr = format!("0.0.0.0:{}", port);
        let tcp_listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                port,
                message: e.to_string(),
            })?;

        tracing::info!(port, "HTTP server listening");

        let shutdown_rx = self.shutdown_rx;
        let shutdown_future = async move {
            if let Some(rx) = shutdown_rx {
                let _ = rx.await;
            } else {
                wait_for_shutdown_signal().await;
            }
            tracing::info!("Received shutdown signal, stopping server");
        };

        axum::serve(tcp_listener, self.router)
            .with_graceful_shutdown(shutdown_future)
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut sigterm), Ok(mut sigint)) =
            (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
        else {
            tracing::warn!("Failed to register signal handlers; running until killed");
            std::future::pending::<()>().await;
            return;
        };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Failed to register Ctrl+C handler; running until killed");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C");
    }
}

/// Convenience function to set up programmatic shutdown.
///
/// Returns a sender that triggers shutdown and a receiver to pass to
/// [`HttpServer::with_shutdown`].
pub fn shutdown_channel() -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
    oneshot::channel()
}
