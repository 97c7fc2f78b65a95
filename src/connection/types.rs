use super::provider::Provider;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to a connected provider.
pub type ProviderHandle = Arc<dyn Provider>;

/// Network the connected wallet or node currently reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkState {
	/// Chain id exactly as reported, decimal or `0x` hex. `None` until known.
	pub chain_id: Option<String>,
}

/// Provider availability.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
	pub provider: Option<ProviderHandle>,
}

/// A block-arrival notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
	pub number: u64,
	#[serde(default)]
	pub hash: Option<String>,
}

/// Error types for provider and block subscription operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("WebSocket error: {0}")]
	WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("RPC error {code}: {message}")]
	RpcError { code: i64, message: String },

	#[error("Invalid response: {0}")]
	InvalidResponse(String),

	#[error("Subscription error: {0}")]
	SubscriptionError(String),
}
