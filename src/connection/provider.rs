//! JSON-RPC provider used to read chain data.

use super::types::ProviderError;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Blockchain connectivity handle.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
	/// Endpoint the provider talks to, forwarded to the indexer session.
	fn endpoint(&self) -> &str;

	/// Issue a raw JSON-RPC request and return its `result`.
	async fn request(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, ProviderError>;

	/// Chain id as reported by the node, in `0x` hex form.
	async fn chain_id(&self) -> Result<String, ProviderError> {
		let result = self.request("eth_chainId", json!([])).await?;
		result
			.as_str()
			.map(str::to_string)
			.ok_or_else(|| ProviderError::InvalidResponse(format!("eth_chainId: {}", result)))
	}

	async fn block_number(&self) -> Result<u64, ProviderError> {
		let result = self.request("eth_blockNumber", json!([])).await?;
		parse_quantity(&result)
	}
}

/// Provider speaking JSON-RPC over HTTP.
pub struct HttpProvider {
	http_client: Client,
	url: String,
	next_id: AtomicU64,
}

impl HttpProvider {
	pub fn new(url: String) -> Result<Self, ProviderError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;
		Ok(Self {
			http_client,
			url,
			next_id: AtomicU64::new(1),
		})
	}
}

impl fmt::Debug for HttpProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HttpProvider").field("url", &self.url).finish()
	}
}

#[async_trait]
impl Provider for HttpProvider {
	fn endpoint(&self) -> &str {
		&self.url
	}

	async fn request(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, ProviderError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let body = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});
		debug!("JSON-RPC request {} -> {}", method, self.url);

		let response = self.http_client.post(&self.url).json(&body).send().await?;
		if !response.status().is_success() {
			return Err(ProviderError::InvalidResponse(format!(
				"HTTP status {} for {}",
				response.status(),
				method
			)));
		}

		let response_json: serde_json::Value = response.json().await?;
		into_rpc_result(response_json)
	}
}

/// Unwrap a JSON-RPC response envelope.
pub(crate) fn into_rpc_result(
	mut response: serde_json::Value,
) -> Result<serde_json::Value, ProviderError> {
	if let Some(error) = response.get("error") {
		let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
		let message = error
			.get("message")
			.and_then(|m| m.as_str())
			.unwrap_or("unknown error")
			.to_string();
		return Err(ProviderError::RpcError { code, message });
	}

	response
		.get_mut("result")
		.map(serde_json::Value::take)
		.ok_or_else(|| ProviderError::InvalidResponse("missing result".to_string()))
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
pub(crate) fn parse_quantity(value: &serde_json::Value) -> Result<u64, ProviderError> {
	let text = value
		.as_str()
		.ok_or_else(|| ProviderError::InvalidResponse(format!("expected quantity, got {}", value)))?;
	let digits = text
		.strip_prefix("0x")
		.ok_or_else(|| ProviderError::InvalidResponse(format!("quantity without 0x: {}", text)))?;
	u64::from_str_radix(digits, 16)
		.map_err(|e| ProviderError::InvalidResponse(format!("bad quantity {}: {}", text, e)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rpc_result_is_extracted() {
		let result = into_rpc_result(json!({"jsonrpc": "2.0", "id": 1, "result": "0x7a69"}));
		assert_eq!(result.unwrap(), json!("0x7a69"));
	}

	#[test]
	fn rpc_error_is_surfaced() {
		let result = into_rpc_result(json!({
			"jsonrpc": "2.0",
			"id": 1,
			"error": {"code": -32601, "message": "method not found"}
		}));
		match result {
			Err(ProviderError::RpcError { code, message }) => {
				assert_eq!(code, -32601);
				assert_eq!(message, "method not found");
			}
			other => panic!("unexpected: {:?}", other),
		}
	}

	#[test]
	fn missing_result_is_invalid() {
		assert!(matches!(
			into_rpc_result(json!({"jsonrpc": "2.0", "id": 1})),
			Err(ProviderError::InvalidResponse(_))
		));
	}

	#[test]
	fn quantities_parse_from_hex() {
		assert_eq!(parse_quantity(&json!("0x1b4")).unwrap(), 436);
		assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
		assert!(parse_quantity(&json!("436")).is_err());
		assert!(parse_quantity(&json!(436)).is_err());
	}
}
