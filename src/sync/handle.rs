use crate::indexer::{IndexerError, IndexerSession, IndexingStatus, LastSync, SyncingState};

use std::sync::Arc;
use tokio::sync::watch;

/// Application-facing view of the indexer session.
///
/// Exposes the session's reactive state and passes imperative operations straight through.
#[derive(Clone)]
pub struct IndexerHandle {
	session: Arc<dyn IndexerSession>,
}

impl IndexerHandle {
	pub fn new(session: Arc<dyn IndexerSession>) -> Self {
		Self { session }
	}

	/// Derived application state.
	pub fn state(&self) -> watch::Receiver<serde_json::Value> {
		self.session.state()
	}

	pub fn syncing(&self) -> watch::Receiver<SyncingState> {
		self.session.syncing()
	}

	pub fn status(&self) -> watch::Receiver<IndexingStatus> {
		self.session.status()
	}

	pub async fn reset(&self) -> Result<(), IndexerError> {
		self.session.reset().await
	}

	pub async fn index_to_latest(&self) -> Result<Option<LastSync>, IndexerError> {
		self.session.index_to_latest().await
	}

	pub async fn index_more(&self) -> Result<Option<LastSync>, IndexerError> {
		self.session.index_more().await
	}

	pub async fn start_auto_indexing(&self) -> Result<(), IndexerError> {
		self.session.start_auto_indexing().await
	}

	pub async fn index_more_and_catchup_if_needed(&self) -> Result<(), IndexerError> {
		self.session.index_more_and_catchup_if_needed().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::indexer::IndexerUpdate;
	use crate::sync::testing::{MockSession, SessionCall};
	use serde_json::json;

	#[tokio::test]
	async fn operations_pass_through_to_session() {
		let (session, mut calls) = MockSession::new(0, None);
		let handle = IndexerHandle::new(session);

		handle.index_more().await.unwrap();
		handle.index_to_latest().await.unwrap();
		handle.start_auto_indexing().await.unwrap();
		handle.reset().await.unwrap();
		handle.index_more_and_catchup_if_needed().await.unwrap();

		let mut seen = Vec::new();
		while let Ok(call) = calls.try_recv() {
			seen.push(match call {
				SessionCall::Other(name) => name,
				SessionCall::CatchUp => "catch_up",
				SessionCall::Init(_) => "init",
			});
		}
		assert_eq!(
			seen,
			vec![
				"index_more",
				"index_to_latest",
				"start_auto_indexing",
				"reset",
				"catch_up"
			]
		);
	}

	#[tokio::test]
	async fn reactive_handles_follow_session_updates() {
		let (session, _calls) = MockSession::new(0, None);
		let handle = IndexerHandle::new(session.clone());
		let state = handle.state();
		let status = handle.status();

		session.channels().apply(IndexerUpdate {
			state: Some(json!({"round": 3})),
			syncing: None,
			status: Some(IndexingStatus::Processing),
		});
		assert_eq!(*state.borrow(), json!({"round": 3}));
		assert_eq!(*status.borrow(), IndexingStatus::Processing);
		assert!(handle.syncing().borrow().waiting_for_provider);
	}
}
