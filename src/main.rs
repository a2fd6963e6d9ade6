//! LLM Chat Relay - Main entry point
//!
//! This binary loads configuration from the environment, builds the router
//! and serves it until shutdown.

use anyhow::Result;
use chrono::Local;
use llm_chat_relay::{
    core::{init_metrics, AppConfig, RateLimiter},
    create_router, AppState, ModelRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle rate-limiter keys are dropped.
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

    println!("Tokio runtime: using {} worker threads", worker_threads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn init_tracing() {
    let no_color = std::env::var("NO_COLOR").is_ok();
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,llm_chat_relay=debug".to_string());

    // Appended last so a bare RUST_LOG=trace does not let HTTP library noise through.
    let filter_str = format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    );
    let filter = tracing_subscriber::EnvFilter::new(filter_str);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_timer(LocalTime))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(!no_color),
            )
            .init();
    }
}

async fn async_main() -> Result<()> {
    init_tracing();
    init_metrics();

    let config = AppConfig::from_env()?;
    tracing::debug!(config = ?config, "Configuration loaded");

    if !config.has_credential() {
        tracing::warn!(
            "OPENROUTER_API_KEY is not set; /api/chat and /api/stream will fail until it is configured"
        );
    }
    if config.rate_limit.trust_proxy {
        tracing::info!("TRUST_PROXY enabled; rate limiting callers by X-Forwarded-For / X-Real-IP");
    }
    if config.cors.is_permissive() {
        tracing::info!("ALLOWED_ORIGINS not set; accepting cross-origin requests from any origin");
    }

    let registry = ModelRegistry::load(config.model_registry_path.as_deref())?;
    registry.log_models();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = Arc::new(AppState::new(config, registry)?);

    spawn_rate_limit_pruner(state.rate_limiter.clone());

    let app = create_router(state);

    tracing::info!("Starting LLM Chat Relay on {}", addr);
    tracing::info!("Chat API: /api/chat, /api/stream");
    tracing::info!("Catalogue: /api/health, /api/models");
    tracing::info!("Swagger UI: /swagger-ui");
    tracing::info!("Metrics endpoint: /metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn spawn_rate_limit_pruner(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.prune_idle();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
