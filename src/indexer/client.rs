//!
//! GraphQL client for a remote indexer session.
//!
//! The indexing engine runs as a separate service. This client drives it: imperative operations
//! are GraphQL mutations over HTTP, and the derived state, syncing progress and status are pushed
//! over a `graphql-transport-ws` subscription into the session's watch channels.

use super::session::{IndexerSession, SessionChannels};
use super::types::*;

use crate::utils::Reconnect;

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use reqwest::Client;
use serde_json::json;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{
	connect_async,
	tungstenite::{Message, client::IntoClientRequest},
};
use tracing::{debug, error, info, warn};

const LAST_SYNC_FIELDS: &str = "latestBlock lastToBlock numRequests syncedAt";

type UpdateStream = Pin<Box<dyn Stream<Item = Result<IndexerUpdate, IndexerError>> + Send>>;

/// Remote indexer session client
#[derive(Clone)]
pub struct GraphQlIndexerSession {
	/// The underlying HTTP client for GraphQL operations.
	http_client: Client,
	/// The GraphQL HTTP endpoint of the indexer service.
	indexer_url: String,
	/// The WebSocket endpoint for the update subscription.
	ws_url: String,
	channels: Arc<SessionChannels>,
	updates_task: Arc<Mutex<Option<JoinHandle<()>>>>,
	/// Initial delay before resubscribing after the update stream ends.
	retry_interval: Duration,
}

impl GraphQlIndexerSession {
	/// Create a new session client.
	///
	/// # Arguments
	/// * `indexer_url` - The HTTP endpoint for GraphQL operations.
	/// * `ws_url` - The WebSocket endpoint for subscriptions.
	pub fn new(indexer_url: String, ws_url: String) -> Result<Self, IndexerError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

		Ok(Self {
			http_client,
			indexer_url,
			ws_url,
			channels: Arc::new(SessionChannels::new()),
			updates_task: Arc::new(Mutex::new(None)),
			retry_interval: Duration::from_millis(500),
		})
	}

	/// Initial delay before resubscribing; later delays back off exponentially.
	pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
		self.retry_interval = retry_interval;
		self
	}

	/// Run a mutation whose payload is an optional `LastSync`.
	async fn last_sync_mutation(
		&self,
		field: &str,
		query: &str,
		variables: Option<serde_json::Value>,
	) -> Result<Option<LastSync>, IndexerError> {
		let response = self.execute_query(query, variables).await?;
		parse_last_sync(&response, field)
	}

	/// Start pumping subscription updates into the watch channels, once.
	///
	/// The first subscription is made here so a broken endpoint fails the caller. After that the
	/// pump reconnects on its own whenever the stream ends.
	async fn ensure_updates_running(&self) -> Result<(), IndexerError> {
		let mut task = self.updates_task.lock().await;
		if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
			return Ok(());
		}

		let updates = self.subscribe_updates().await?;
		let session = self.clone();
		*task = Some(tokio::spawn(async move { session.pump_updates(updates).await }));

		Ok(())
	}

	async fn pump_updates(&self, mut updates: UpdateStream) {
		let mut reconnect = Reconnect::new(self.retry_interval);
		loop {
			if drain_updates(&mut updates, &self.channels).await > 0 {
				reconnect.reset();
			}
			warn!("Indexer update subscription ended, reconnecting");

			updates = loop {
				sleep(reconnect.next_delay()).await;
				match self.subscribe_updates().await {
					Ok(updates) => break updates,
					Err(e) => warn!("Failed to resubscribe to indexer updates: {}", e),
				}
			};
			info!("Indexer update subscription re-established");
		}
	}

	/// Subscribe to indexer updates.
	///
	/// # Returns
	/// A pinned async stream of `IndexerUpdate` results.
	///
	/// # Errors
	/// Returns `IndexerError` if the WebSocket connection or handshake fails.
	pub async fn subscribe_updates(&self) -> Result<UpdateStream, IndexerError> {
		debug!("Attempting WebSocket connection to: {}", self.ws_url);

		// Create WebSocket request with required subprotocol
		let mut request = self.ws_url.clone().into_client_request()?;
		request.headers_mut().insert(
			"Sec-WebSocket-Protocol",
			"graphql-transport-ws".parse().map_err(|_| {
				IndexerError::GraphQLError("Invalid WebSocket subprotocol header value".to_string())
			})?,
		);

		let (ws_stream, response) = connect_async(request).await?;
		debug!(
			"WebSocket connection established, response status: {}",
			response.status()
		);
		let (mut ws_sender, mut ws_receiver) = ws_stream.split();

		let init_message = json!({
			"type": "connection_init"
		});
		ws_sender
			.send(Message::Text(init_message.to_string()))
			.await?;

		// Wait for connection ack
		if let Some(msg) = ws_receiver.next().await {
			match msg? {
				Message::Text(text) => {
					let parsed: serde_json::Value = serde_json::from_str(&text)?;
					if parsed.get("type").and_then(|t| t.as_str()) != Some("connection_ack") {
						return Err(IndexerError::SessionError(
							"Connection not acknowledged".to_string(),
						));
					}
				}
				_ => {
					return Err(IndexerError::SessionError(
						"Unexpected message type during handshake".to_string(),
					));
				}
			}
		}

		let start_message = json!({
			"id": "indexer-updates",
			"type": "subscribe",
			"payload": {
				"query": r#"
            subscription IndexerUpdates {
                indexerUpdates {
                    state
                    syncing
                    status
                }
            }
            "#
			}
		});

		ws_sender
			.send(Message::Text(start_message.to_string()))
			.await?;

		// The sender lives as long as the stream; it also answers server pings.
		let ws_sender = Arc::new(Mutex::new(ws_sender));
		let stream = ws_receiver.filter_map(move |msg| {
			let ws_sender = ws_sender.clone();
			let reply = match &msg {
				Ok(Message::Text(text)) => pong_reply(text),
				_ => None,
			};
			let item = match msg {
				Ok(Message::Text(text)) => {
					parse_subscription_message(&text, "indexerUpdates").map(|data| {
						data.and_then(|value| {
							serde_json::from_value::<IndexerUpdate>(value).map_err(|e| {
								error!("Failed to deserialize indexer update: {}", e);
								IndexerError::JsonError(e)
							})
						})
					})
				}
				Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
				Ok(Message::Close(_)) => None,
				Ok(_) => Some(Err(IndexerError::GraphQLError(
					"Unexpected message type".to_string(),
				))),
				Err(e) => Some(Err(IndexerError::WebSocketError(e))),
			};
			async move {
				if let Some(reply) = reply {
					if let Err(e) = ws_sender.lock().await.send(Message::Text(reply)).await {
						warn!("Failed to answer subscription ping: {}", e);
					}
				}
				item
			}
		});

		Ok(Box::pin(stream))
	}

	/// Execute a GraphQL operation.
	///
	/// # Returns
	/// The JSON response from the indexer, or an `IndexerError` if the request fails.
	pub async fn execute_query(
		&self,
		query: &str,
		variables: Option<serde_json::Value>,
	) -> Result<serde_json::Value, IndexerError> {
		let request_body = json!({
			"query": query,
			"variables": variables
		});

		let response = self
			.http_client
			.post(&self.indexer_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(IndexerError::GraphQLError(format!(
				"HTTP error: {}",
				response.status()
			)));
		}

		let response_json: serde_json::Value = response.json().await?;

		if let Some(errors) = response_json.get("errors") {
			return Err(IndexerError::GraphQLError(format!(
				"GraphQL errors: {}",
				errors
			)));
		}

		Ok(response_json)
	}
}

#[async_trait]
impl IndexerSession for GraphQlIndexerSession {
	async fn init(&self, args: InitArgs) -> Result<Option<LastSync>, IndexerError> {
		info!(
			"Initializing remote indexer for chain {} with {} contracts",
			args.source.chain_id,
			args.source.contracts.len()
		);

		// Updates start flowing before init so the first pass is visible.
		self.ensure_updates_running().await?;
		self.channels.set_status(IndexingStatus::Loading);

		let query = format!(
			"mutation Init($args: InitArgs!) {{ init(args: $args) {{ {} }} }}",
			LAST_SYNC_FIELDS
		);
		let variables = json!({ "args": args });
		let last_sync = self.last_sync_mutation("init", &query, Some(variables)).await?;

		self.channels.update_syncing(|s| {
			s.waiting_for_provider = false;
			s.last_sync = last_sync.clone();
		});
		Ok(last_sync)
	}

	async fn index_more_and_catchup_if_needed(&self) -> Result<(), IndexerError> {
		let query = format!(
			"mutation {{ indexMoreAndCatchupIfNeeded {{ {} }} }}",
			LAST_SYNC_FIELDS
		);
		self.last_sync_mutation("indexMoreAndCatchupIfNeeded", &query, None)
			.await?;
		Ok(())
	}

	async fn index_more(&self) -> Result<Option<LastSync>, IndexerError> {
		let query = format!("mutation {{ indexMore {{ {} }} }}", LAST_SYNC_FIELDS);
		self.last_sync_mutation("indexMore", &query, None).await
	}

	async fn index_to_latest(&self) -> Result<Option<LastSync>, IndexerError> {
		let query = format!("mutation {{ indexToLatest {{ {} }} }}", LAST_SYNC_FIELDS);
		self.last_sync_mutation("indexToLatest", &query, None).await
	}

	async fn start_auto_indexing(&self) -> Result<(), IndexerError> {
		self.execute_query("mutation { startAutoIndexing }", None)
			.await?;
		Ok(())
	}

	async fn reset(&self) -> Result<(), IndexerError> {
		self.execute_query("mutation { reset }", None).await?;
		self.channels.apply(IndexerUpdate {
			state: Some(serde_json::Value::Null),
			syncing: Some(SyncingState::default()),
			status: Some(IndexingStatus::Idle),
		});
		Ok(())
	}

	fn state(&self) -> watch::Receiver<serde_json::Value> {
		self.channels.state()
	}

	fn syncing(&self) -> watch::Receiver<SyncingState> {
		self.channels.syncing()
	}

	fn status(&self) -> watch::Receiver<IndexingStatus> {
		self.channels.status()
	}
}

/// Apply every update of `updates` to `channels` until the stream ends. Returns how many
/// updates were applied.
async fn drain_updates(updates: &mut UpdateStream, channels: &SessionChannels) -> usize {
	let mut applied = 0;
	while let Some(update) = updates.next().await {
		match update {
			Ok(update) => {
				channels.apply(update);
				applied += 1;
			}
			Err(e) => {
				warn!("Error in indexer update subscription: {}", e);
				channels.update_syncing(|s| s.error = Some(e.to_string()));
			}
		}
	}
	applied
}

/// The `pong` frame answering a `graphql-transport-ws` `ping`, echoing its payload.
fn pong_reply(text: &str) -> Option<String> {
	let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
	if parsed.get("type").and_then(|t| t.as_str()) != Some("ping") {
		return None;
	}
	let pong = match parsed.get("payload") {
		Some(payload) => json!({ "type": "pong", "payload": payload }),
		None => json!({ "type": "pong" }),
	};
	Some(pong.to_string())
}

/// Extract `data.<field>` from a mutation response as an optional `LastSync`.
fn parse_last_sync(
	response: &serde_json::Value,
	field: &str,
) -> Result<Option<LastSync>, IndexerError> {
	let value = response
		.get("data")
		.and_then(|data| data.get(field))
		.ok_or(IndexerError::NoData)?;

	if value.is_null() {
		return Ok(None);
	}
	Ok(Some(serde_json::from_value(value.clone())?))
}

/// Interpret one `graphql-transport-ws` text frame.
///
/// Returns `None` for frames that carry nothing for the caller (keepalives, acks, completion).
fn parse_subscription_message(
	text: &str,
	field: &str,
) -> Option<Result<serde_json::Value, IndexerError>> {
	let parsed = match serde_json::from_str::<serde_json::Value>(text) {
		Ok(parsed) => parsed,
		Err(e) => return Some(Err(IndexerError::JsonError(e))),
	};

	let Some(msg_type) = parsed.get("type").and_then(|t| t.as_str()) else {
		return Some(Err(IndexerError::GraphQLError(
			"Message missing type field".to_string(),
		)));
	};

	match msg_type {
		"next" => Some(
			parsed
				.get("payload")
				.and_then(|p| p.get("data"))
				.and_then(|d| d.get(field))
				.cloned()
				.ok_or(IndexerError::NoData),
		),
		"error" => {
			let error_msg = parsed
				.get("payload")
				.and_then(|p| p.as_array().and_then(|errors| errors.first()).or(Some(p)))
				.and_then(|p| p.get("message"))
				.and_then(|m| m.as_str())
				.unwrap_or("Unknown subscription error");
			Some(Err(IndexerError::GraphQLError(error_msg.to_string())))
		}
		"complete" => {
			debug!("Subscription {} completed", field);
			None
		}
		_ => {
			debug!("Ignoring message type: {}", msg_type);
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_last_sync_reads_payload() {
		let response = json!({
			"data": {
				"indexMore": {
					"latestBlock": 120,
					"lastToBlock": 118,
					"numRequests": 7
				}
			}
		});
		let last_sync = parse_last_sync(&response, "indexMore").unwrap().unwrap();
		assert_eq!(last_sync.latest_block, 120);
		assert_eq!(last_sync.last_to_block, 118);
		assert_eq!(last_sync.num_requests, Some(7));
		assert!(last_sync.synced_at.is_none());
	}

	#[test]
	fn parse_last_sync_null_is_none() {
		let response = json!({ "data": { "init": null } });
		assert!(parse_last_sync(&response, "init").unwrap().is_none());
	}

	#[test]
	fn parse_last_sync_missing_field_is_no_data() {
		let response = json!({ "data": {} });
		assert!(matches!(
			parse_last_sync(&response, "init"),
			Err(IndexerError::NoData)
		));
	}

	#[test]
	fn subscription_next_frame_yields_field() {
		let frame = json!({
			"id": "indexer-updates",
			"type": "next",
			"payload": { "data": { "indexerUpdates": { "status": "Fetching" } } }
		})
		.to_string();
		let value = parse_subscription_message(&frame, "indexerUpdates")
			.unwrap()
			.unwrap();
		let update: IndexerUpdate = serde_json::from_value(value).unwrap();
		assert_eq!(update.status, Some(IndexingStatus::Fetching));
	}

	#[test]
	fn subscription_error_frame_surfaces_message() {
		let frame = json!({
			"id": "indexer-updates",
			"type": "error",
			"payload": [{ "message": "not initialized" }]
		})
		.to_string();
		match parse_subscription_message(&frame, "indexerUpdates") {
			Some(Err(IndexerError::GraphQLError(msg))) => assert_eq!(msg, "not initialized"),
			other => panic!("unexpected result: {:?}", other.map(|r| r.is_ok())),
		}
	}

	#[test]
	fn subscription_control_frames_are_skipped() {
		let complete = json!({ "id": "indexer-updates", "type": "complete" }).to_string();
		assert!(parse_subscription_message(&complete, "indexerUpdates").is_none());
		let ping = json!({ "type": "ping" }).to_string();
		assert!(parse_subscription_message(&ping, "indexerUpdates").is_none());
	}

	#[test]
	fn subscription_rejects_untyped_frames() {
		assert!(matches!(
			parse_subscription_message("{}", "indexerUpdates"),
			Some(Err(IndexerError::GraphQLError(_)))
		));
		assert!(matches!(
			parse_subscription_message("not json", "indexerUpdates"),
			Some(Err(IndexerError::JsonError(_)))
		));
	}

	#[test]
	fn pong_answers_ping_only() {
		let pong: serde_json::Value =
			serde_json::from_str(&pong_reply(r#"{"type":"ping"}"#).unwrap()).unwrap();
		assert_eq!(pong, json!({ "type": "pong" }));

		let pong: serde_json::Value =
			serde_json::from_str(&pong_reply(r#"{"type":"ping","payload":{"n":1}}"#).unwrap())
				.unwrap();
		assert_eq!(pong, json!({ "type": "pong", "payload": { "n": 1 } }));

		assert!(pong_reply(r#"{"type":"next","payload":{}}"#).is_none());
		assert!(pong_reply("not json").is_none());
	}

	#[tokio::test]
	async fn drain_applies_updates_and_records_errors() {
		let channels = SessionChannels::new();
		let mut updates: UpdateStream = Box::pin(futures_util::stream::iter(vec![
			Ok(IndexerUpdate {
				state: Some(json!({ "planets": 4 })),
				syncing: None,
				status: Some(IndexingStatus::Processing),
			}),
			Err(IndexerError::GraphQLError("lagging".to_string())),
		]));

		assert_eq!(drain_updates(&mut updates, &channels).await, 1);
		assert_eq!(*channels.state().borrow(), json!({ "planets": 4 }));
		assert_eq!(*channels.status().borrow(), IndexingStatus::Processing);
		assert_eq!(
			channels.syncing().borrow().error.as_deref(),
			Some("GraphQL error: lagging")
		);
	}

	#[tokio::test]
	async fn update_pump_resubscribes_and_answers_pings() {
		use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
		use tokio_tungstenite::tungstenite::http::HeaderValue;

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let ws_url = format!("ws://{}", listener.local_addr().unwrap());
		let (pong_tx, mut pong_rx) = tokio::sync::mpsc::unbounded_channel();

		let server = tokio::spawn(async move {
			for status in ["Fetching", "Loaded"] {
				let (tcp, _) = listener.accept().await.unwrap();
				let mut ws = tokio_tungstenite::accept_hdr_async(
					tcp,
					|_: &Request, mut response: Response| {
						response.headers_mut().insert(
							"Sec-WebSocket-Protocol",
							HeaderValue::from_static("graphql-transport-ws"),
						);
						Ok::<_, ErrorResponse>(response)
					},
				)
				.await
				.unwrap();

				let _init = ws.next().await;
				let ack = json!({ "type": "connection_ack" });
				ws.send(Message::Text(ack.to_string())).await.unwrap();
				let _subscribe = ws.next().await;
				let next = json!({
					"id": "indexer-updates",
					"type": "next",
					"payload": { "data": { "indexerUpdates": { "status": status } } }
				});
				ws.send(Message::Text(next.to_string())).await.unwrap();

				if status == "Fetching" {
					ws.send(Message::Text(json!({ "type": "ping" }).to_string()))
						.await
						.unwrap();
					if let Some(Ok(Message::Text(reply))) = ws.next().await {
						let _ = pong_tx.send(reply);
					}
					let _ = ws.close(None).await;
					while let Some(Ok(_)) = ws.next().await {}
				} else {
					while let Some(Ok(_)) = ws.next().await {}
				}
			}
		});

		let session = GraphQlIndexerSession::new("http://127.0.0.1:9/graphql".to_string(), ws_url)
			.unwrap()
			.with_retry_interval(Duration::from_millis(20));
		session.ensure_updates_running().await.unwrap();

		let timeout = Duration::from_secs(5);
		let reply = tokio::time::timeout(timeout, pong_rx.recv())
			.await
			.unwrap()
			.unwrap();
		assert_eq!(
			serde_json::from_str::<serde_json::Value>(&reply).unwrap(),
			json!({ "type": "pong" })
		);

		let mut status = session.status();
		let loaded =
			tokio::time::timeout(timeout, status.wait_for(|s| *s == IndexingStatus::Loaded)).await;
		assert!(matches!(loaded, Ok(Ok(_))));

		server.abort();
	}
}
