//! RPC endpoint configuration.

use serde::{Deserialize, Serialize};

use crate::error::OpsError;

/// Alchemy mainnet endpoint template used when only `ALCHEMY_KEY` is supplied.
pub const ALCHEMY_MAINNET_URL: &str = "https://eth-mainnet.alchemyapi.io/v2/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Primary JSON-RPC endpoint
    #[serde(default)]
    pub url: Option<String>,

    /// Tried in order after the primary fails
    #[serde(default)]
    pub fallback_urls: Vec<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Split `eth_getLogs` into windows of this many blocks (unset = single query)
    #[serde(default)]
    pub log_chunk_size: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    // log queries over months of history are slow on most providers
    120_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: None,
            fallback_urls: Vec::new(),
            timeout_ms: default_timeout_ms(),
            log_chunk_size: None,
        }
    }
}

impl RpcConfig {
    pub fn alchemy_mainnet(key: &str) -> String {
        format!("{}{}", ALCHEMY_MAINNET_URL, key.trim())
    }

    /// The primary endpoint, or a configuration error naming how to supply one.
    pub fn endpoint(&self) -> Result<&str, OpsError> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                OpsError::Configuration(
                    "no RPC endpoint configured: set rpc.url, TREE_OPS_RPC_URL, ALCHEMY_KEY or --rpc-url"
                        .to_string(),
                )
            })
    }

    pub fn validate(&self) -> Result<(), OpsError> {
        for url in self.url.iter().chain(self.fallback_urls.iter()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(OpsError::Configuration(format!(
                    "rpc endpoint {:?} must be an http(s) URL",
                    url
                )));
            }
        }
        if self.log_chunk_size == Some(0) {
            return Err(OpsError::Configuration(
                "rpc.log_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(OpsError::Configuration(
                "rpc.timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
