//! HTTP server setup and process bootstrap.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::answers::AnswerTable;
use crate::config::{Config, ConfigError, KeySource};
use crate::error::Result;
use crate::upstream::{ChatBackend, ExplorerClient, Upstream};

/// Shared application state. Built once at startup, read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub answers: Arc<AnswerTable>,
    pub chat: Arc<ChatBackend>,
    pub explorer: Arc<ExplorerClient>,
    pub upstream: Upstream,
}

impl AppState {
    /// Assemble state from a config whose API key is already resolved.
    pub fn new(config: Config, answers: AnswerTable) -> Result<Self> {
        let api_key = config
            .api_key()
            .cloned()
            .ok_or_else(|| ConfigError::MissingApiKey {
                name: config.chat.name.clone(),
                var: crate::config::convention_env_var_name(&config.chat.name),
            })?;

        let upstream = Upstream::new(&config.upstream)?;
        let chat = ChatBackend::from_config(&config.chat, api_key);
        let explorer = ExplorerClient::new(&config.explorer.url)?;

        Ok(Self {
            config: Arc::new(config),
            answers: Arc::new(answers),
            chat: Arc::new(chat),
            explorer: Arc::new(explorer),
            upstream,
        })
    }
}

/// Load static data and resolve secrets. Any failure aborts startup.
///
/// Order: answers file, then API key. Nothing is retried.
pub fn bootstrap(config: Config) -> Result<(AppState, KeySource)> {
    let answers = AnswerTable::from_file(&config.data.answers)?;
    tracing::info!(
        path = %config.data.answers,
        entries = answers.len(),
        "Loaded predefined answers"
    );
    if answers.is_empty() {
        tracing::warn!("Answers file is empty - /ask will only return the default reply");
    }

    let (config, key_source) = config.resolve_api_key()?;
    tracing::info!(backend = %config.chat.name, source = %key_source, "Resolved chat API key");

    let state = AppState::new(config, answers)?;
    Ok((state, key_source))
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = state.config.server.cors;

    let router = Router::new()
        .route("/", get(handlers::welcome))
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Chat
        .route("/ask", post(handlers::ask))
        .route("/chat", post(handlers::chat))
        // Explorer proxy
        .route("/account/:address", get(handlers::account))
        .route("/transactions/:address", get(handlers::transactions))
        .route("/block/:block_num", get(handlers::block))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting algochat server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
