//! algochat - chat and Algorand explorer proxy backend
//!
//! This library provides the core functionality for the algochat server:
//! configuration, the predefined answer table, upstream clients and the
//! HTTP API that ties them together.

pub mod answers;
pub mod config;
pub mod error;
pub mod proxy;
pub mod upstream;

pub use config::Config;
pub use error::{Error, Result};
