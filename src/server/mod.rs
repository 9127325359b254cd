//! HTTP front of the canonicalizers.
//!
//! - `GET /` serves a small form
//! - `GET /health` is the liveness check
//! - `POST /canonicalize` takes `{"header", "body"}` and returns both canonicalized
//! - `POST /canonicalize/message` takes a whole `{"message"}` and splits it first
//!
//! No state is kept between requests.

mod config;
mod error;
mod routes;

pub use config::ServerConfig;
pub use error::{ErrorDetail, ErrorResponse, ServerError, ServerResult};
pub use routes::{CanonicalizeMessageRequest, CanonicalizeRequest, CanonicalizeResponse};

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the router with every route and the middleware stack.
pub fn build_router(config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/canonicalize", post(routes::canonicalize))
        .route("/canonicalize/message", post(routes::canonicalize_full_message))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.timeout(),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Install the JSON log subscriber, then serve until SIGTERM or Ctrl+C.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(false)
        .json()
        .init();

    let addr = config.socket_addr()?;
    let app = build_router(&config);

    tracing::info!(%addr, "starting dkim-canon server");
    tracing::info!(
        timeout_secs = config.timeout_secs,
        max_body_size_kb = config.max_body_size_kb,
        "limits"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
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

    tracing::info!("shutdown signal received");
}
