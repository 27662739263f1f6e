//! Ethereum JSON-RPC client.
//!
//! Primary endpoint plus optional fallbacks, tried in order with exponential
//! backoff. With no fallbacks configured a request is attempted exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U64};
use alloy_rpc_types_eth::{BlockNumberOrTag, Filter, Log};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chain::{BlockHeader, BlockLogReader, ContractCaller};
use crate::config::RpcConfig;
use crate::error::{OpsError, RpcError};

pub struct EthRpcClient {
    pub primary_url: String,
    pub fallback_urls: Vec<String>,
    pub http: Client,
    pub log_chunk_size: Option<u64>,
    next_id: AtomicU64,
}

impl EthRpcClient {
    pub fn from_config(cfg: &RpcConfig) -> Result<Self, OpsError> {
        let primary_url = cfg.endpoint()?.to_string();
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| OpsError::Configuration(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            primary_url,
            fallback_urls: cfg.fallback_urls.clone(),
            http,
            log_chunk_size: cfg.log_chunk_size,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call an RPC method, failing over to the next endpoint on transport or HTTP errors.
    /// A JSON-RPC error object is returned immediately: the node answered, it just said no.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let urls: Vec<&String> = std::iter::once(&self.primary_url)
            .chain(self.fallback_urls.iter())
            .collect();
        let max_attempts = urls.len();
        let mut backoff_ms = 100u64;

        for (attempt, url) in urls.into_iter().enumerate() {
            if attempt > 0 {
                tracing::debug!(backoff_ms, method, "Backing off before next endpoint");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(10_000);
            }

            tracing::debug!(url = %url, method, id, attempt = attempt + 1, "rpc request");

            let failure = match self.http.post(url.as_str()).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => RpcError::Status {
                    url: url.clone(),
                    status: resp.status().as_u16(),
                },
                Ok(resp) => {
                    let json: Value = resp.json().await?;
                    if attempt > 0 {
                        tracing::info!(url = %url, attempt = attempt + 1, "rpc request succeeded on fallback endpoint");
                    }
                    return extract_result(json);
                }
                Err(e) => RpcError::Transport(e),
            };

            tracing::warn!(
                url = %url,
                method,
                error = %failure,
                attempt = attempt + 1,
                max_attempts,
                "rpc endpoint failed"
            );
            if max_attempts == 1 {
                return Err(failure);
            }
            if attempt + 1 >= max_attempts {
                return Err(RpcError::Exhausted {
                    attempts: max_attempts,
                    last: failure.to_string(),
                });
            }
        }

        Err(RpcError::Exhausted {
            attempts: max_attempts,
            last: "no endpoints configured".to_string(),
        })
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        decode::<U64>("eth_blockNumber", result).map(|n| n.to::<u64>())
    }

    async fn logs_single(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        let result = self.request("eth_getLogs", json!([filter])).await?;
        decode("eth_getLogs", result)
    }

    /// Walk `[from, to]` in fixed windows so providers with range limits answer.
    /// Only a filter without a numeric upper bound costs an `eth_blockNumber` lookup.
    async fn logs_chunked(&self, filter: &Filter, chunk: u64) -> Result<Vec<Log>, RpcError> {
        let head = match filter.get_to_block() {
            Some(n) => n,
            None => self.block_number().await?,
        };
        let mut current_from = filter.get_from_block().unwrap_or(head);

        let mut all_logs = Vec::new();
        while current_from <= head {
            let current_to = current_from.saturating_add(chunk - 1).min(head);
            let window = filter.clone().from_block(current_from).to_block(current_to);
            all_logs.extend(self.logs_single(&window).await?);
            current_from = current_to + 1;
        }
        Ok(all_logs)
    }
}

/// The two header fields the forecaster needs out of `eth_getBlockByNumber`.
#[derive(Deserialize)]
struct RpcHeader {
    number: U64,
    timestamp: U64,
}

#[async_trait]
impl BlockLogReader for EthRpcClient {
    async fn block(&self, tag: BlockNumberOrTag) -> Result<BlockHeader, RpcError> {
        let result = self
            .request("eth_getBlockByNumber", json!([tag, false]))
            .await?;
        if result.is_null() {
            return Err(RpcError::MissingBlock(tag.to_string()));
        }
        let header: RpcHeader = decode("eth_getBlockByNumber", result)?;
        Ok(BlockHeader {
            number: header.number.to::<u64>(),
            timestamp: header.timestamp.to::<u64>(),
        })
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        match self.log_chunk_size {
            Some(chunk) if chunk > 0 => self.logs_chunked(filter, chunk).await,
            _ => self.logs_single(filter).await,
        }
    }
}

#[async_trait]
impl ContractCaller for EthRpcClient {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, RpcError> {
        let tx = json!({ "to": to, "data": calldata });
        let result = self.request("eth_call", json!([tx, BlockNumberOrTag::Latest])).await?;
        decode("eth_call", result)
    }
}

fn extract_result(mut json: Value) -> Result<Value, RpcError> {
    if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
        return Err(RpcError::Rpc {
            code: err["code"].as_i64().unwrap_or_default(),
            message: err["message"].as_str().unwrap_or("unknown error").to_string(),
        });
    }
    match json.get_mut("result").map(Value::take) {
        Some(result) => Ok(result),
        None => Err(RpcError::Malformed(format!("response has neither result nor error: {}", json))),
    }
}

fn decode<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, RpcError> {
    serde_json::from_value(result).map_err(|e| RpcError::Malformed(format!("{}: {}", method, e)))
}
