//! HTTP surface: JSON chat API, market snapshot and the web chat page.

pub mod routes;

use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chatbot::Chatbot;

/// Shared state for all web routes.
#[derive(Clone)]
pub struct ApiState {
    pub chatbot: Arc<Chatbot>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: &str, chatbot: Arc<Chatbot>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr, "http server listening");

    axum::serve(listener, router(ApiState { chatbot })).await?;
    Ok(())
}
