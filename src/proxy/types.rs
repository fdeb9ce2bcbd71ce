//! Request and response bodies of the public HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Greeting returned by `GET /`.
pub const WELCOME_MESSAGE: &str = "Welcome to Algorand AI Chatbot!";

/// Transactions returned when `limit` is not given.
pub const DEFAULT_TRANSACTION_LIMIT: u32 = 5;

/// Body of `POST /ask` and `POST /chat`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Reply of `POST /ask`. `query` is the normalized form that was looked up.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub query: String,
    pub response: String,
}

/// Reply of `POST /chat`. `response` is whatever the chat backend produced.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub query: String,
    pub response: Value,
}

/// Query string of `GET /transactions/{address}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_TRANSACTION_LIMIT
}
