use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use course_rag::core::config::AppPaths;
use course_rag::core::logging;
use course_rag::server;
use course_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may set COURSE_RAG_ROOT, so it has to load before path discovery
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to load .env: {}", err);
        }
    }

    let paths = Arc::new(AppPaths::new());
    let log_dir = logging::init(&paths);
    tracing::info!(log_dir = %log_dir.display(), "Logging initialized");

    let state = AppState::initialize(paths).await?;

    let docs_dir = state.paths.docs_dir.clone();
    match state.rag.add_course_folder(&docs_dir, false).await {
        Ok((courses, chunks)) => {
            tracing::info!(courses, chunks, "Loaded course documents");
        }
        Err(err) => tracing::error!("Failed to load course documents: {}", err),
    }

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let app: Router = server::router::router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutting down");
}
