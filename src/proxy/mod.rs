//! HTTP API module.
//!
//! Routes inbound requests either to the predefined answer table or to
//! one of the upstream clients, and relays the result.

mod handlers;
mod server;
pub mod types;

pub use server::{bootstrap, create_router, run_server, AppState};
pub use types::{AskResponse, ChatResponse, QueryRequest, TransactionsParams};
