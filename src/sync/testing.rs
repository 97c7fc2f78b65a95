//! In-memory session and provider used by the sync tests.

use crate::connection::{Provider, ProviderError};
use crate::indexer::{
	ChainId, IndexerError, IndexerSession, IndexingStatus, InitArgs, LastSync, SessionChannels,
	SessionOptions, SourceDescription, SyncingState,
};
use crate::persistence::{IndexedStateLocation, keep_state_on_locations};

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Semaphore, mpsc, watch};

pub(crate) const GENESIS: &str =
	"0x6b52f0ed7ae6a5ce0a1bc95cbeb2e0b3b07e1bea0bd2ad1c5ab3cd0ee1b4f0a5";

pub(crate) fn test_source() -> SourceDescription {
	SourceDescription::new(ChainId::new(31337), vec![], GENESIS).unwrap()
}

pub(crate) fn test_options() -> SessionOptions {
	let location = IndexedStateLocation::new("memory://indexed/").unwrap();
	SessionOptions {
		track_num_requests: true,
		keep_state: keep_state_on_locations("Game", vec![location]).unwrap(),
	}
}

/// Session operations observed by `MockSession`.
#[derive(Debug)]
pub(crate) enum SessionCall {
	Init(InitArgs),
	CatchUp,
	Other(&'static str),
}

pub(crate) struct MockSession {
	calls: mpsc::UnboundedSender<SessionCall>,
	channels: SessionChannels,
	init_calls: AtomicUsize,
	init_failures: AtomicUsize,
	fail_next_pass: AtomicBool,
	/// When set, each catch-up pass waits for one permit.
	pass_gate: Option<Arc<Semaphore>>,
}

impl MockSession {
	/// A session whose first `init_failures` inits fail.
	pub(crate) fn new(
		init_failures: usize,
		pass_gate: Option<Arc<Semaphore>>,
	) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionCall>) {
		let (calls, rx) = mpsc::unbounded_channel();
		let session = Arc::new(Self {
			calls,
			channels: SessionChannels::new(),
			init_calls: AtomicUsize::new(0),
			init_failures: AtomicUsize::new(init_failures),
			fail_next_pass: AtomicBool::new(false),
			pass_gate,
		});
		(session, rx)
	}

	pub(crate) fn init_calls(&self) -> usize {
		self.init_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn fail_next_pass(&self) {
		self.fail_next_pass.store(true, Ordering::SeqCst);
	}

	pub(crate) fn channels(&self) -> &SessionChannels {
		&self.channels
	}

	fn record(&self, call: SessionCall) {
		let _ = self.calls.send(call);
	}
}

#[async_trait]
impl IndexerSession for MockSession {
	async fn init(&self, args: InitArgs) -> Result<Option<LastSync>, IndexerError> {
		self.init_calls.fetch_add(1, Ordering::SeqCst);
		self.record(SessionCall::Init(args));

		let failing = self
			.init_failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok();
		if failing {
			return Err(IndexerError::SessionError("init rejected".to_string()));
		}

		self.channels.set_status(IndexingStatus::Loaded);
		Ok(Some(LastSync {
			latest_block: 10,
			last_to_block: 10,
			num_requests: Some(1),
			synced_at: None,
		}))
	}

	async fn index_more_and_catchup_if_needed(&self) -> Result<(), IndexerError> {
		self.record(SessionCall::CatchUp);
		if let Some(gate) = &self.pass_gate {
			if let Ok(permit) = gate.acquire().await {
				permit.forget();
			}
		}
		if self.fail_next_pass.swap(false, Ordering::SeqCst) {
			return Err(IndexerError::SessionError("pass rejected".to_string()));
		}
		Ok(())
	}

	async fn index_more(&self) -> Result<Option<LastSync>, IndexerError> {
		self.record(SessionCall::Other("index_more"));
		Ok(None)
	}

	async fn index_to_latest(&self) -> Result<Option<LastSync>, IndexerError> {
		self.record(SessionCall::Other("index_to_latest"));
		Ok(None)
	}

	async fn start_auto_indexing(&self) -> Result<(), IndexerError> {
		self.record(SessionCall::Other("start_auto_indexing"));
		Ok(())
	}

	async fn reset(&self) -> Result<(), IndexerError> {
		self.record(SessionCall::Other("reset"));
		self.channels.set_status(IndexingStatus::Idle);
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

/// Provider that only answers `eth_chainId`.
#[derive(Debug)]
pub(crate) struct StaticProvider {
	chain_id: String,
}

impl StaticProvider {
	pub(crate) fn new(chain_id: &str) -> Self {
		Self {
			chain_id: chain_id.to_string(),
		}
	}
}

#[async_trait]
impl Provider for StaticProvider {
	fn endpoint(&self) -> &str {
		"memory://test"
	}

	async fn request(
		&self,
		method: &str,
		_params: serde_json::Value,
	) -> Result<serde_json::Value, ProviderError> {
		match method {
			"eth_chainId" => Ok(json!(self.chain_id)),
			other => Err(ProviderError::RpcError {
				code: -32601,
				message: format!("{} not supported", other),
			}),
		}
	}
}
