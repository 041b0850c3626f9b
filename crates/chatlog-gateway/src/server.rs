// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chatlog_config::model::GatewayConfig;
use chatlog_core::{ChatlogError, SearchAdapter, StorageAdapter};
use chatlog_pipeline::Dispatcher;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Primary store for reads and application management.
    pub storage: Arc<dyn StorageAdapter>,
    /// Search store for message search.
    pub search: Arc<dyn SearchAdapter>,
    /// Entry point for asynchronous writes.
    pub dispatcher: Arc<Dispatcher>,
    /// Base for status URLs; the request `Host` is used when unset.
    pub public_base_url: Option<String>,
    /// Process start time for uptime calculation.
    pub started: Instant,
}

impl GatewayState {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        search: Arc<dyn SearchAdapter>,
        dispatcher: Arc<Dispatcher>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            storage,
            search,
            dispatcher,
            public_base_url,
            started: Instant::now(),
        }
    }
}

/// Build the full route table.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/applications",
            post(handlers::create_application).get(handlers::list_applications),
        )
        .route(
            "/applications/{token}",
            get(handlers::get_application).patch(handlers::rename_application),
        )
        .route(
            "/applications/{token}/chats",
            post(handlers::create_chat).get(handlers::list_chats),
        )
        .route(
            "/applications/{token}/chats/{chat_number}",
            get(handlers::get_chat).patch(handlers::update_chat),
        )
        .route(
            "/applications/{token}/chats/{chat_number}/messages",
            post(handlers::create_message).get(handlers::list_messages),
        )
        .route(
            "/applications/{token}/chats/{chat_number}/messages/search",
            get(handlers::search_messages),
        )
        .route(
            "/applications/{token}/chats/{chat_number}/messages/{message_number}",
            get(handlers::get_message).patch(handlers::update_message),
        )
        .route("/chats/status/{task_id}", get(handlers::get_chat_status))
        .route(
            "/messages/status/{task_id}",
            get(handlers::get_message_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
///
/// In-flight requests finish before this returns.
pub async fn serve(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ChatlogError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChatlogError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ChatlogError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
