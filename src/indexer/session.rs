//! The indexer session seam.
//!
//! An `IndexerSession` owns event ingestion and the derived application state. The sync
//! controller only sequences it: `init` once, then `index_more_and_catchup_if_needed` on every
//! relevant block. Whether overlapping catch-up requests queue, coalesce or race is part of
//! each implementation's contract.

use super::types::*;

use async_trait::async_trait;
use tokio::sync::watch;

/// Operations and reactive handles exposed by an indexer session.
#[async_trait]
pub trait IndexerSession: Send + Sync {
	/// Initialize the session against a provider and a source description.
	async fn init(&self, args: InitArgs) -> Result<Option<LastSync>, IndexerError>;

	/// Index newly available events, catching up to the chain head if behind.
	async fn index_more_and_catchup_if_needed(&self) -> Result<(), IndexerError>;

	/// Run a single indexing step.
	async fn index_more(&self) -> Result<Option<LastSync>, IndexerError>;

	/// Index until the latest block is reached.
	async fn index_to_latest(&self) -> Result<Option<LastSync>, IndexerError>;

	/// Let the session keep indexing on its own schedule.
	async fn start_auto_indexing(&self) -> Result<(), IndexerError>;

	/// Discard indexed state and start over.
	async fn reset(&self) -> Result<(), IndexerError>;

	fn state(&self) -> watch::Receiver<serde_json::Value>;

	fn syncing(&self) -> watch::Receiver<SyncingState>;

	fn status(&self) -> watch::Receiver<IndexingStatus>;
}

/// Watch channels backing a session's reactive handles.
#[derive(Debug)]
pub struct SessionChannels {
	state: watch::Sender<serde_json::Value>,
	syncing: watch::Sender<SyncingState>,
	status: watch::Sender<IndexingStatus>,
}

impl SessionChannels {
	pub fn new() -> Self {
		Self {
			state: watch::Sender::new(serde_json::Value::Null),
			syncing: watch::Sender::new(SyncingState::default()),
			status: watch::Sender::new(IndexingStatus::default()),
		}
	}

	/// Publish whichever parts of an update are present.
	pub fn apply(&self, update: IndexerUpdate) {
		if let Some(state) = update.state {
			self.state.send_replace(state);
		}
		if let Some(syncing) = update.syncing {
			self.syncing.send_replace(syncing);
		}
		if let Some(status) = update.status {
			self.status.send_replace(status);
		}
	}

	pub fn set_status(&self, status: IndexingStatus) {
		self.status.send_replace(status);
	}

	/// Mutate the syncing state in place and notify subscribers.
	pub fn update_syncing(&self, modify: impl FnOnce(&mut SyncingState)) {
		self.syncing.send_modify(modify);
	}

	pub fn state(&self) -> watch::Receiver<serde_json::Value> {
		self.state.subscribe()
	}

	pub fn syncing(&self) -> watch::Receiver<SyncingState> {
		self.syncing.subscribe()
	}

	pub fn status(&self) -> watch::Receiver<IndexingStatus> {
		self.status.subscribe()
	}
}

impl Default for SessionChannels {
	fn default() -> Self {
		Self::new()
	}
}
