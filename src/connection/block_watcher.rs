//! Block-arrival feeder.
//!
//! Subscribes to `newHeads` over a JSON-RPC WebSocket and announces each head on the
//! `ConnectionObserver`. Failed connections and ended streams are retried with exponential
//! backoff.

use super::observer::ConnectionObserver;
use super::provider::{into_rpc_result, parse_quantity};
use super::types::{NewBlock, ProviderError};

use crate::utils::Reconnect;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::json;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

type BlockStream = Pin<Box<dyn Stream<Item = Result<NewBlock, ProviderError>> + Send>>;

pub struct BlockWatcher {
	ws_url: String,
	observer: Arc<ConnectionObserver>,
	retry_interval: Duration,
}

impl BlockWatcher {
	pub fn new(ws_url: String, observer: Arc<ConnectionObserver>) -> Self {
		Self {
			ws_url,
			observer,
			retry_interval: Duration::from_millis(500),
		}
	}

	/// Initial delay before reconnecting; later delays back off exponentially.
	pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
		self.retry_interval = retry_interval;
		self
	}

	/// Run the watcher on a background task for the rest of the process.
	pub fn spawn(self) -> JoinHandle<()> {
		tokio::spawn(async move { self.run().await })
	}

	/// Subscribe, forward heads until the stream ends, then wait and subscribe again.
	///
	/// The delay only resets after a subscription delivered at least one head, so a node that
	/// accepts the subscription and then hangs up is retried with growing delays.
	async fn run(&self) {
		let mut reconnect = Reconnect::new(self.retry_interval);
		loop {
			match self.subscribe_new_heads().await {
				Ok(mut heads) => {
					info!("Watching new blocks on {}", self.ws_url);
					if self.forward_heads(&mut heads).await > 0 {
						reconnect.reset();
					}
					warn!("newHeads subscription ended, reconnecting");
				}
				Err(e) => warn!("newHeads subscription to {} failed: {}", self.ws_url, e),
			}
			sleep(reconnect.next_delay()).await;
		}
	}

	/// Announce every head of `heads` on the observer. Returns how many were announced.
	async fn forward_heads(&self, heads: &mut BlockStream) -> usize {
		let mut delivered = 0;
		while let Some(head) = heads.next().await {
			match head {
				Ok(block) => {
					debug!("New block {}", block.number);
					self.observer.notify_new_block(block);
					delivered += 1;
				}
				Err(e) => warn!("Error in newHeads subscription: {}", e),
			}
		}
		delivered
	}

	/// Open a WebSocket and subscribe to `newHeads`.
	pub async fn subscribe_new_heads(&self) -> Result<BlockStream, ProviderError> {
		let (ws_stream, response) = connect_async(self.ws_url.as_str()).await?;
		debug!(
			"WebSocket connection established, response status: {}",
			response.status()
		);
		let (mut ws_sender, mut ws_receiver) = ws_stream.split();

		let subscribe = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": "eth_subscribe",
			"params": ["newHeads"],
		});
		ws_sender.send(Message::Text(subscribe.to_string())).await?;

		// The first text frame answers the subscribe request.
		let subscription_id = loop {
			match ws_receiver.next().await {
				Some(Ok(Message::Text(text))) => {
					let response: serde_json::Value = serde_json::from_str(&text)?;
					let result = into_rpc_result(response)?;
					break result.as_str().map(str::to_string).ok_or_else(|| {
						ProviderError::SubscriptionError(format!(
							"unexpected subscription id {}",
							result
						))
					})?;
				}
				Some(Ok(_)) => continue,
				Some(Err(e)) => return Err(e.into()),
				None => {
					return Err(ProviderError::SubscriptionError(
						"connection closed before subscription was confirmed".to_string(),
					));
				}
			}
		};
		debug!("newHeads subscription id {}", subscription_id);

		let stream = ws_receiver.filter_map(move |msg| {
			let _keepalive = &ws_sender;
			let item = match msg {
				Ok(Message::Text(text)) => parse_new_head(&text),
				Ok(Message::Close(_)) => None,
				Ok(_) => None,
				Err(e) => Some(Err(ProviderError::WebSocketError(e))),
			};
			async move { item }
		});

		Ok(Box::pin(stream))
	}
}

/// Interpret one `eth_subscription` notification frame.
///
/// Returns `None` for frames that are not head notifications.
pub fn parse_new_head(text: &str) -> Option<Result<NewBlock, ProviderError>> {
	let parsed: serde_json::Value = match serde_json::from_str(text) {
		Ok(parsed) => parsed,
		Err(e) => return Some(Err(ProviderError::JsonError(e))),
	};

	if parsed.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
		return None;
	}

	let Some(head) = parsed.get("params").and_then(|p| p.get("result")) else {
		return Some(Err(ProviderError::InvalidResponse(
			"notification without result".to_string(),
		)));
	};

	let number = match head.get("number") {
		Some(number) => parse_quantity(number),
		None => Err(ProviderError::InvalidResponse(
			"head without number".to_string(),
		)),
	};

	Some(number.map(|number| NewBlock {
		number,
		hash: head
			.get("hash")
			.and_then(|h| h.as_str())
			.map(str::to_string),
	}))
}
