//! Reactive connection state.
//!
//! `ConnectionObserver` holds the current network and provider as watch channels and fans out
//! block-arrival notifications over a broadcast channel. Feeders (the provider connect step,
//! the network poller, the block watcher) write into it; the sync controller reads from it.

use super::types::{ConnectionState, NetworkState, NewBlock, ProviderHandle};

use std::future::Future;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const BLOCK_CHANNEL_CAPACITY: usize = 64;

pub struct ConnectionObserver {
	network: watch::Sender<NetworkState>,
	connection: watch::Sender<ConnectionState>,
	blocks: broadcast::Sender<NewBlock>,
}

impl ConnectionObserver {
	pub fn new() -> Self {
		let (blocks, _) = broadcast::channel(BLOCK_CHANNEL_CAPACITY);
		Self {
			network: watch::Sender::new(NetworkState::default()),
			connection: watch::Sender::new(ConnectionState::default()),
			blocks,
		}
	}

	/// Publish the network currently reported by the wallet or node.
	///
	/// Subscribers are notified on every call, even when the value is unchanged.
	pub fn set_network(&self, chain_id: Option<String>) {
		debug!("Network state set to {:?}", chain_id);
		self.network.send_replace(NetworkState { chain_id });
	}

	pub fn set_provider(&self, provider: Option<ProviderHandle>) {
		self.connection.send_replace(ConnectionState { provider });
	}

	pub fn network_state(&self) -> NetworkState {
		self.network.borrow().clone()
	}

	pub fn connection_state(&self) -> ConnectionState {
		self.connection.borrow().clone()
	}

	pub fn subscribe_network(&self) -> watch::Receiver<NetworkState> {
		self.network.subscribe()
	}

	/// Announce a new block. Returns how many listeners received it.
	pub fn notify_new_block(&self, block: NewBlock) -> usize {
		self.blocks.send(block).unwrap_or(0)
	}

	/// Register a callback run for every block announced after this call.
	///
	/// The listener is subscribed before this returns, so no block announced afterwards is
	/// missed. Callbacks run one at a time in arrival order. The task lives as long as the
	/// observer.
	pub fn on_new_block<F, Fut>(&self, callback: F) -> JoinHandle<()>
	where
		F: Fn(NewBlock) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let mut receiver = self.blocks.subscribe();
		tokio::spawn(async move {
			loop {
				match receiver.recv().await {
					Ok(block) => callback(block).await,
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!("Block listener lagged, {} notifications dropped", skipped);
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		})
	}
}

impl Default for ConnectionObserver {
	fn default() -> Self {
		Self::new()
	}
}
