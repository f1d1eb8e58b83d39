//! Lookout Relay Binary
//!
//! Starts the presence relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin lookout-relay
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `LOOKOUT_API_PORT`: API server port (default: 8080)
//! - `LOOKOUT_HEALTH_PORT`: Health check HTTP port (default: 8081)
//! - `LOOKOUT_UPSTREAM_API_URL`: Upstream REST base URL
//! - `LOOKOUT_UPSTREAM_PIPELINE_URL`: Upstream pipeline WebSocket URL
//! - `LOOKOUT_HEARTBEAT_INTERVAL_SECS`: SSE ping interval (default: 15)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use lookout_relay::infrastructure::ratelimit::RateLimiter;
use lookout_relay::infrastructure::relay::SessionRegistry;
use lookout_relay::infrastructure::snapshot::{SnapshotFetcher, UpstreamApi, WorldCache};
use lookout_relay::infrastructure::telemetry;
use lookout_relay::infrastructure::upstream::pipeline::PipelineClientConfig;
use lookout_relay::{
    ApiServer, ApiState, HealthServer, HealthServerState, RelayConfig, RelaySettings, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Timeout for outbound upstream REST calls.
const UPSTREAM_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Lookout Relay");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Shared state: world cache, session registry, rate limiter
    let worlds = Arc::new(WorldCache::new(config.world_cache_ttl));
    let registry = Arc::new(SessionRegistry::new());
    let limiter = Arc::new(RateLimiter::new(config.rate_limit));

    // Upstream REST client and snapshot fetcher
    let http = reqwest::Client::builder()
        .timeout(UPSTREAM_HTTP_TIMEOUT)
        .build()?;
    let api = UpstreamApi::new(
        http,
        config.upstream.api_base_url.clone(),
        config.upstream.user_agent.clone(),
    );
    let fetcher = SnapshotFetcher::new(api, Arc::clone(&worlds), config.snapshot.clone());

    // Per-session relay settings
    let relay_settings = RelaySettings {
        pipeline: PipelineClientConfig::new(
            config.upstream.pipeline_base_url.clone(),
            config.upstream.user_agent.clone(),
        ),
        heartbeat_interval: config.heartbeat_interval,
    };

    // API server
    let api_state = Arc::new(ApiState {
        fetcher,
        relay: relay_settings,
        registry: Arc::clone(&registry),
        limiter,
        shutdown: shutdown_token.clone(),
    });
    let api_server = ApiServer::new(config.server.api_port, api_state, shutdown_token.clone());

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&registry),
        Arc::clone(&worlds),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Relay ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Relay stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        api_port = config.server.api_port,
        health_port = config.server.health_port,
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        page_size = config.snapshot.page_size,
        "Configuration loaded"
    );
    tracing::debug!(
        api_url = %config.upstream.api_base_url,
        pipeline_url = %config.upstream.pipeline_base_url,
        "Upstream endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
