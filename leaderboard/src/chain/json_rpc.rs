// Copyright (c) 2024 Botho Foundation

//! `eth_call` client for ERC-721 `balanceOf`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{ChainError, ChainReader};

/// First four bytes of keccak256("balanceOf(address)")
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Encode `balanceOf(holder)` call data.
///
/// The holder must decode to exactly 20 bytes; anything else is rejected
/// before touching the network.
pub fn balance_of_calldata(holder: &str) -> Result<String, ChainError> {
    let digits = holder
        .strip_prefix("0x")
        .or_else(|| holder.strip_prefix("0X"))
        .unwrap_or(holder);

    let bytes = hex::decode(digits)
        .map_err(|e| ChainError::Rejected(format!("invalid address {:?}: {}", holder, e)))?;
    if bytes.len() != 20 {
        return Err(ChainError::Rejected(format!(
            "invalid address {:?}: expected 20 bytes, got {}",
            holder,
            bytes.len()
        )));
    }

    // ABI word: 12 zero bytes then the address
    Ok(format!(
        "0x{}{}{}",
        BALANCE_OF_SELECTOR,
        "0".repeat(24),
        hex::encode(bytes)
    ))
}

/// Parse a hex quantity returned by `eth_call` into a `u64`.
pub fn parse_quantity(raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Rejected(format!("result is not hex: {:?}", raw)))?;

    if digits.is_empty() {
        // What nodes return when `to` has no code
        return Err(ChainError::Rejected(
            "empty call result (no contract at address?)".to_string(),
        ));
    }

    // from_str_radix alone would also take a sign
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ChainError::Rejected(format!("result is not hex: {:?}", raw)));
    }

    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 16 {
        return Err(ChainError::Rejected(format!(
            "balance does not fit in 64 bits: {}",
            raw
        )));
    }

    u64::from_str_radix(significant, 16)
        .map_err(|e| ChainError::Rejected(format!("result is not hex: {:?}: {}", raw, e)))
}

/// Chain reader speaking Ethereum JSON-RPC over HTTP(S)
#[derive(Debug, Clone)]
pub struct JsonRpcChainReader {
    client: reqwest::Client,
    url: String,
}

impl JsonRpcChainReader {
    /// Create a reader for `url`; every request is bounded by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Unavailable(format!("request to {} timed out", self.url))
                } else {
                    ChainError::Unavailable(format!("request to {} failed: {}", self.url, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(ChainError::Unavailable(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Unavailable(format!("malformed response: {}", e)))?;

        debug!(
            method,
            id,
            latency_ms = start.elapsed().as_millis() as u64,
            "Chain RPC call completed"
        );

        if let Some(error) = body.error {
            return Err(ChainError::Rejected(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        body.result
            .ok_or_else(|| ChainError::Rejected("missing result in RPC response".to_string()))
    }
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    async fn token_balance(&self, contract: &str, holder: &str) -> Result<u64, ChainError> {
        let data = balance_of_calldata(holder)?;
        let params = json!([{ "to": contract, "data": data }, "latest"]);

        let result = self.call("eth_call", params).await?;
        let raw = result.as_str().ok_or_else(|| {
            ChainError::Rejected(format!("unexpected result type: {}", result))
        })?;

        parse_quantity(raw).map_err(|e| {
            warn!(contract, holder, raw, "Unusable balanceOf result");
            e
        })
    }
}
