//! HTTP request handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use super::server::AppState;
use super::types::{AskResponse, ChatResponse, QueryRequest, TransactionsParams, WELCOME_MESSAGE};
use crate::answers::DEFAULT_ANSWER;
use crate::error::{Error, Result};
use crate::upstream::explorer::{AccountBalance, TransactionHistory};

/// Unwrap a JSON body, turning extractor rejections into a `detail` error.
fn query_body(
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<QueryRequest> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Error::BadRequest(rejection.body_text())
    })?;
    Ok(request)
}

/// Unwrap a path extractor; a segment that fails to parse becomes a `detail` error.
fn path_param<T>(param: std::result::Result<Path<T>, PathRejection>) -> Result<T> {
    let Path(value) = param.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected path parameter");
        Error::InvalidParams(rejection.body_text())
    })?;
    Ok(value)
}

fn query_params<T>(params: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    let Query(value) = params.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected query string");
        Error::InvalidParams(rejection.body_text())
    })?;
    Ok(value)
}

/// Handle GET /
pub async fn welcome() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": WELCOME_MESSAGE
    }))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "algochat"
    }))
}

/// Handle GET /config - public settings only, the API key is never serialized
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.as_ref().clone())
}

/// Handle POST /ask - predefined answers; a miss is not an error
pub async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<AskResponse>> {
    let request = query_body(payload)?;
    let (query, answer) = state.answers.lookup(&request.query);
    let hit = answer != DEFAULT_ANSWER;

    tracing::info!(query = %query, hit, "Predefined answer lookup");

    Ok(Json(AskResponse {
        query,
        response: answer.to_string(),
    }))
}

/// Handle POST /chat - forward to the configured chat backend
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let request = query_body(payload)?;

    tracing::info!(
        backend = %state.chat.name(),
        query_chars = request.query.chars().count(),
        "Received chat request"
    );

    let response = state.chat.complete(&state.upstream, &request.query).await?;

    Ok(Json(ChatResponse {
        query: request.query,
        response,
    }))
}

/// Handle GET /account/:address
pub async fn account(
    State(state): State<AppState>,
    address: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<AccountBalance>> {
    let address = path_param(address)?;
    tracing::info!(address = %address, "Account balance request");
    let balance = state.explorer.account(&state.upstream, &address).await?;
    Ok(Json(balance))
}

/// Handle GET /transactions/:address?limit=N
pub async fn transactions(
    State(state): State<AppState>,
    address: std::result::Result<Path<String>, PathRejection>,
    params: std::result::Result<Query<TransactionsParams>, QueryRejection>,
) -> Result<Json<TransactionHistory>> {
    let address = path_param(address)?;
    let params = query_params(params)?;
    tracing::info!(address = %address, limit = params.limit, "Transaction history request");
    let history = state
        .explorer
        .transactions(&state.upstream, &address, params.limit)
        .await?;
    Ok(Json(history))
}

/// Handle GET /block/:block_num
pub async fn block(
    State(state): State<AppState>,
    block_num: std::result::Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>> {
    let block_num = path_param(block_num)?;
    tracing::info!(block = block_num, "Block info request");
    let block = state.explorer.block(&state.upstream, block_num).await?;
    Ok(Json(block))
}
