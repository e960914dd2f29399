mod utils;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::http_server;
use crate::state::ServiceState;
use crate::Config;

pub use utils::{graceful_shutdown_blocker, register_panic_logger};

/// Brings the service up and blocks until shutdown completes: tracing,
/// panic logging, state construction, the HTTP server, and finally a
/// bounded wait for the token sweeper.
pub async fn spawn_service(config: Config) {
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    register_panic_logger();

    tracing::info!(
        listen = %config.server.listen,
        base_url = %config.server.base_url,
        "config loaded"
    );
    tracing::info!(
        max_file_size_mb = config.limits.max_file_size_mb,
        max_files = config.limits.max_files,
        max_total_size_mb = config.limits.max_total_size_mb,
        upload_concurrency = config.limits.upload_concurrency,
        transcode_concurrency = config.limits.transcode_concurrency,
        download_ttl_seconds = config.tokens.download_ttl_seconds,
        bridge_ttl_seconds = config.tokens.bridge_ttl_seconds,
        "limits"
    );

    let state = match ServiceState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating service state: {}", e);
            std::process::exit(3);
        }
    };

    let (_signal_handle, _shutdown_tx, shutdown_rx) = graceful_shutdown_blocker();

    if let Err(e) = http_server::run(&config.server.listen, state.clone(), shutdown_rx).await {
        tracing::error!("http server error: {}", e);
    }

    // Bounded shutdown: wait for the background token sweeper to exit.
    state.tokens().close().await;
    tracing::info!("service stopped");
}
