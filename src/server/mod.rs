use crate::config::Config;
use crate::lifecycle::ShutdownReport;
use crate::notify::SupervisorNotifier;
use crate::pipeline::PipelineFactory;
use crate::tuner::{AllowList, Tuner};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamgate_common::PathResolver;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

pub mod dispatch;
pub mod error;
pub mod passthrough;

pub use error::AppError;
pub use passthrough::{PlaybackResolver, YtDlpResolver};

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Maps request paths under the served root
    pub resolver: Arc<PathResolver>,
    /// The stream registry
    pub tuner: Arc<Tuner>,
    /// Direct playback resolution, present when passthrough is enabled
    pub playback: Option<Arc<dyn PlaybackResolver>>,
    /// Client for passthrough upstream fetches
    pub http: reqwest::Client,
}

impl AppContext {
    /// Build the context for an already provisioned, absolute served root.
    pub fn new(config: Config, root: PathBuf, factory: Arc<dyn PipelineFactory>) -> Result<Self> {
        let resolver = PathResolver::new(&root, config.hls.default_document.clone())
            .context("Invalid served root")?
            .with_shared_resources(config.hls.shared_resources.iter().cloned())
            // A player re-polling the playlist after a restart re-tunes its stream
            .with_tune_documents([config.hls.playlist_name.clone()]);

        let allow_list = AllowList::new(config.server.allow_list.iter().cloned());
        if allow_list.is_empty() {
            tracing::info!("No allow list configured, any address may be tuned");
        } else {
            tracing::info!(count = config.server.allow_list.len(), "Allow list configured");
        }
        let tuner = Tuner::new(root, allow_list, factory);

        let playback: Option<Arc<dyn PlaybackResolver>> = if config.passthrough.enabled {
            Some(Arc::new(YtDlpResolver::new(
                config.tools.fetcher.clone(),
                config.tools.fetcher_extra_args.clone(),
                Duration::from_secs(config.passthrough.request_timeout_secs),
            )))
        } else {
            None
        };

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.passthrough.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Ok(Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            tuner: Arc::new(tuner),
            playback,
            http,
        })
    }

    /// Replace the playback resolver, enabling passthrough.
    pub fn with_playback(mut self, playback: Arc<dyn PlaybackResolver>) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn first_output_wait(&self) -> Duration {
        Duration::from_secs(self.config.server.first_output_wait_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.config.server.shutdown_grace_secs)
    }
}

/// Create the Axum router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/protocol-handler", get(dispatch::protocol_handler))
        .fallback(dispatch::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind the configured address and serve until SIGINT/SIGTERM.
pub async fn start_server(ctx: AppContext, notifier: Arc<dyn SupervisorNotifier>) -> Result<ShutdownReport> {
    let host = ctx.config.server.host.clone();
    let port = ctx.config.server.port;

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    serve(listener, ctx, notifier, shutdown_signal()).await
}

/// Serve on `listener` until `shutdown` resolves, then tear down every
/// tuned pipeline.
///
/// The supervisor is told we are ready once the listener is accepting and
/// that we are stopping as soon as shutdown begins.
pub async fn serve<F>(
    listener: TcpListener,
    ctx: AppContext,
    notifier: Arc<dyn SupervisorNotifier>,
    shutdown: F,
) -> Result<ShutdownReport>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(ctx.clone());

    tracing::info!(
        "Serving {:?} on http://{}",
        ctx.resolver.root(),
        listener.local_addr()?
    );
    notifier.ready();

    let stopping = notifier.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            stopping.stopping();
        })
        .await;

    // Pipelines are torn down even when the listener failed.
    let report = ctx.tuner.shutdown_all(ctx.shutdown_grace()).await;
    result.context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(report)
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
