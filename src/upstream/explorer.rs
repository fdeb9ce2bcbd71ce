//! Read-only Algorand block explorer queries.

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use super::{FailureKind, Upstream, UpstreamError};
use crate::config::ConfigError;

/// Backend label used in error details.
pub const EXPLORER: &str = "Explorer";

/// Placeholder balance when the explorer omits `amount`.
pub const BALANCE_NOT_FOUND: &str = "Balance not found";

/// Account balance as returned by `GET /account/{address}`.
#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub address: String,
    pub balance: Value,
}

/// Recent transactions as returned by `GET /transactions/{address}`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionHistory {
    pub address: String,
    pub transactions: Vec<Value>,
}

/// Client for the explorer REST API.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    base: Url,
}

impl ExplorerClient {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url).map_err(|e| {
            ConfigError::Validation(format!("Invalid explorer URL '{}': {}", base_url, e))
        })?;
        Ok(Self { base })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                UpstreamError::new(
                    EXPLORER,
                    FailureKind::Unreachable,
                    format!("explorer URL '{}' cannot take a path", self.base),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Current balance of an account.
    pub async fn account(
        &self,
        upstream: &Upstream,
        address: &str,
    ) -> Result<AccountBalance, UpstreamError> {
        let url = self.endpoint(&["accounts", address])?;
        let data = upstream.send_json(EXPLORER, upstream.http().get(url)).await?;

        let balance = data
            .get("amount")
            .cloned()
            .unwrap_or_else(|| Value::String(BALANCE_NOT_FOUND.to_string()));

        Ok(AccountBalance {
            address: address.to_string(),
            balance,
        })
    }

    /// Up to `limit` recent transactions of an account.
    pub async fn transactions(
        &self,
        upstream: &Upstream,
        address: &str,
        limit: u32,
    ) -> Result<TransactionHistory, UpstreamError> {
        let mut url = self.endpoint(&["accounts", address, "transactions"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let data = upstream.send_json(EXPLORER, upstream.http().get(url)).await?;

        // The explorer is asked for `limit`, but not trusted to honor it.
        let mut transactions = match data.get("transactions") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        transactions.truncate(limit as usize);

        Ok(TransactionHistory {
            address: address.to_string(),
            transactions,
        })
    }

    /// Raw block data, relayed verbatim.
    pub async fn block(&self, upstream: &Upstream, block_num: u64) -> Result<Value, UpstreamError> {
        let block = block_num.to_string();
        let url = self.endpoint(&["blocks", block.as_str()])?;
        upstream.send_json(EXPLORER, upstream.http().get(url)).await
    }
}
