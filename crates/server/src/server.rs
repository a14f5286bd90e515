//! Server entry points: the stdio line loop and the HTTP listener.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::protocol;
use crate::state::CoreContext;

/// Initialise structured logging. Logs go to stderr unconditionally: on the
/// stdio transport, stdout carries protocol frames and nothing else.
pub fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();
}

/// Serve the line-framed JSON-RPC protocol on stdin/stdout until EOF.
pub async fn run_stdio(ctx: Arc<CoreContext>) -> anyhow::Result<()> {
    tracing::info!("serving on stdio, waiting for requests");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if let Some(response) = protocol::handle_line(&ctx, &line).await {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

/// Serve the HTTP/SSE variant until SIGTERM or Ctrl+C.
pub async fn run_http(ctx: Arc<CoreContext>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", ctx.config.server.bind_addr, ctx.config.server.port);
    let router = crate::http::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "serving HTTP/SSE");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
