//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `secure::AppError`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use clap::Parser;
use platform::metrics::PrometheusMetrics;
use secure::domain::repository::{BrokerProducer, MemoryRepository};
use secure::{
    BootUseCase, JointRepository, NotificationProducer, PostgresRepository, ProcessMemoryRepository,
    RedisMemoryRepository, RouteRegistry, SecureAppState, secure_router,
};
use secure::infra::RedisBrokerProducer;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Config, Environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_tracing(config.env);

    tracing::info!(instance = %config.instance, env = ?config.env, "Starting secure");

    let metrics = Arc::new(PrometheusMetrics::new("secure").context("create metrics registry")?);

    let persistent = PostgresRepository::connect(&config.database)
        .await
        .context("connect to PostgreSQL")?;
    tracing::info!(schema = %config.database.schema(), "Connected to database");

    let producer = Arc::new(connect_producer(&config).await);

    match &config.redis {
        Some(options) => {
            let memory = RedisMemoryRepository::connect(options)
                .await
                .context("connect to Redis")?;
            tracing::info!(address = %options.address, "Connected to Redis");
            serve(&config, persistent, memory, metrics, producer).await
        }
        None => {
            tracing::warn!("REDIS_ADDRESS not set, keeping sessions in process memory");
            serve(&config, persistent, ProcessMemoryRepository::new(), metrics, producer).await
        }
    }
}

/// `ENV=production` logs JSON; `ENV=debug` lowers the default level
fn init_tracing(env: Environment) {
    let default_filter = match env {
        Environment::Debug => "api=debug,secure=debug,tower_http=debug",
        Environment::Local | Environment::Production => "api=info,secure=info,tower_http=info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Environment::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        Environment::Local | Environment::Debug => {
            registry.with(tracing_subscriber::fmt::layer()).init()
        }
    }
}

/// An unreachable broker disables notifications instead of failing startup
async fn connect_producer(config: &Config) -> NotificationProducer {
    let Some(options) = &config.broker else {
        tracing::info!("Broker disabled");
        return NotificationProducer::Disabled;
    };

    match RedisBrokerProducer::connect(options).await {
        Ok(producer) => NotificationProducer::Redis(producer),
        Err(e) => {
            tracing::error!(error = %e, "Broker unavailable, notifications disabled");
            NotificationProducer::Disabled
        }
    }
}

async fn serve<M>(
    config: &Config,
    persistent: PostgresRepository,
    memory: M,
    metrics: Arc<PrometheusMetrics>,
    producer: Arc<NotificationProducer>,
) -> anyhow::Result<()>
where
    M: MemoryRepository + Send + Sync + 'static,
{
    let secure_config = Arc::new(config.secure.clone());
    let joint = Arc::new(JointRepository::new(
        persistent,
        memory,
        secure_config.cache_ttl(),
    ));

    let report = BootUseCase::new(joint.clone(), secure_config.clone(), producer.clone())
        .execute()
        .await
        .context("boot sequence")?;

    let state = SecureAppState {
        joint: joint.clone(),
        config: secure_config,
        metrics: metrics.clone(),
        root_user_id: report.root_user_id,
    };

    let mut registry = RouteRegistry::new();
    let app = secure_router(state, &mut registry)?
        .layer(TimeoutLayer::new(config.http.request_timeout))
        .layer(TraceLayer::new_for_http());
    tracing::debug!(routes = registry.len(), "Routes registered");

    let metrics_app = Router::new()
        .route(&config.metrics.url, get(render_metrics))
        .with_state(metrics);

    let listener = TcpListener::bind(config.http.address)
        .await
        .with_context(|| format!("bind {}", config.http.address))?;
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
    let metrics_listener = TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("bind {metrics_addr}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    tracing::info!(
        address = %config.http.address,
        request_timeout = ?config.http.request_timeout,
        read_timeout = ?config.http.read_timeout,
        write_timeout = ?config.http.write_timeout,
        idle_timeout = ?config.http.idle_timeout,
        "Listening"
    );
    let mut http_task = tokio::spawn(
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(closed(shutdown_rx.clone()))
        .into_future(),
    );

    tracing::info!(address = %metrics_addr, url = %config.metrics.url, "Metrics listening");
    let metrics_task = tokio::spawn(
        axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(closed(shutdown_rx))
            .into_future(),
    );

    let finished = tokio::select! {
        () = shutdown_signal() => None,
        result = &mut http_task => Some(result),
    };
    drop(shutdown_tx);

    match finished {
        None => {
            tracing::info!("Shutdown signal received");
            await_stopped(&mut http_task, config.http.shutdown_timeout).await;
        }
        Some(Ok(Ok(()))) => tracing::warn!("HTTP server stopped"),
        Some(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server failed"),
        Some(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
    }
    http_task.abort();
    metrics_task.abort();

    if let Err(e) = producer.close().await {
        tracing::error!(error = %e, "failed to close writer");
    }
    joint.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn await_stopped(
    task: &mut tokio::task::JoinHandle<std::io::Result<()>>,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server failed"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
        Err(_) => tracing::warn!(?timeout, "Graceful shutdown timed out"),
    }
}

/// Resolves once every sender is gone
async fn closed(mut rx: watch::Receiver<()>) {
    while rx.changed().await.is_ok() {}
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn render_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
