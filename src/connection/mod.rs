//! Chain connection observation
//!
//! This module provides the reactive connection state the sync controller gates on: the current
//! network, the provider handle, and block-arrival notifications. It also provides the feeders
//! that keep that state current against a JSON-RPC node.

/// newHeads WebSocket subscription feeding block notifications
mod block_watcher;
/// Watch/broadcast backed connection state
mod observer;
/// JSON-RPC provider abstraction
mod provider;
/// Connection data types and errors
mod types;

pub use block_watcher::{BlockWatcher, parse_new_head};
pub use observer::ConnectionObserver;
pub use provider::{HttpProvider, Provider};
pub use types::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Query the provider's chain, then publish the provider and network on the observer.
///
/// The provider is published first so that gating on the network change sees it.
pub async fn connect_provider(
	observer: &ConnectionObserver,
	provider: ProviderHandle,
) -> Result<String, ProviderError> {
	let chain_id = provider.chain_id().await?;
	info!("Connected to {} on chain {}", provider.endpoint(), chain_id);
	observer.set_provider(Some(provider));
	observer.set_network(Some(chain_id.clone()));
	Ok(chain_id)
}

/// Poll the provider's chain id and republish it whenever it changes.
pub fn watch_network(
	observer: Arc<ConnectionObserver>,
	provider: ProviderHandle,
	interval: Duration,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			ticker.tick().await;
			match provider.chain_id().await {
				Ok(chain_id) => {
					if observer.network_state().chain_id.as_deref() != Some(chain_id.as_str()) {
						info!("Network changed to {}", chain_id);
						observer.set_network(Some(chain_id));
					}
				}
				Err(e) => warn!("Failed to poll chain id: {}", e),
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use serde_json::json;

	#[derive(Debug)]
	struct FixedChainProvider(&'static str);

	#[async_trait]
	impl Provider for FixedChainProvider {
		fn endpoint(&self) -> &str {
			"memory://fixed"
		}

		async fn request(
			&self,
			method: &str,
			_params: serde_json::Value,
		) -> Result<serde_json::Value, ProviderError> {
			match method {
				"eth_chainId" => Ok(json!(self.0)),
				"eth_blockNumber" => Ok(json!("0x10")),
				other => Err(ProviderError::RpcError {
					code: -32601,
					message: format!("{} not supported", other),
				}),
			}
		}
	}

	#[tokio::test]
	async fn connect_publishes_provider_then_network() {
		let observer = ConnectionObserver::new();
		let chain_id = connect_provider(&observer, Arc::new(FixedChainProvider("0x7a69")))
			.await
			.unwrap();

		assert_eq!(chain_id, "0x7a69");
		assert_eq!(observer.network_state().chain_id.as_deref(), Some("0x7a69"));
		let provider = observer.connection_state().provider.unwrap();
		assert_eq!(provider.endpoint(), "memory://fixed");
		assert_eq!(provider.block_number().await.unwrap(), 16);
	}

	#[derive(Debug)]
	struct SwitchableChainProvider(std::sync::Mutex<String>);

	#[async_trait]
	impl Provider for SwitchableChainProvider {
		fn endpoint(&self) -> &str {
			"memory://switchable"
		}

		async fn request(
			&self,
			_method: &str,
			_params: serde_json::Value,
		) -> Result<serde_json::Value, ProviderError> {
			let chain_id = self.0.lock().unwrap().clone();
			Ok(json!(chain_id))
		}
	}

	#[tokio::test]
	async fn poller_republishes_only_on_change() {
		let observer = Arc::new(ConnectionObserver::new());
		let provider = Arc::new(SwitchableChainProvider(std::sync::Mutex::new(
			"0x1".to_string(),
		)));
		let mut network = observer.subscribe_network();
		let poller = watch_network(observer.clone(), provider.clone(), Duration::from_millis(10));

		let timeout = Duration::from_secs(1);
		tokio::time::timeout(timeout, network.changed())
			.await
			.unwrap()
			.unwrap();
		assert_eq!(network.borrow_and_update().chain_id.as_deref(), Some("0x1"));

		// Several polls of the same chain publish nothing.
		tokio::time::sleep(Duration::from_millis(80)).await;
		assert!(!network.has_changed().unwrap());

		*provider.0.lock().unwrap() = "0x2".to_string();
		tokio::time::timeout(timeout, network.changed())
			.await
			.unwrap()
			.unwrap();
		assert_eq!(network.borrow_and_update().chain_id.as_deref(), Some("0x2"));

		poller.abort();
	}
}
