//! Process-wide handle for ad hoc inspection.
//!
//! When exposure is enabled the indexer handle is installed once at startup, after which
//! debugging tools and admin code can reach `state`, `status` and `syncing` without threading
//! the handle through.

use super::handle::IndexerHandle;

use std::sync::OnceLock;
use tracing::{debug, warn};

static GLOBAL_HANDLE: OnceLock<IndexerHandle> = OnceLock::new();

/// Install the handle. Returns `false` if one was already installed; the first one stays.
pub fn expose(handle: IndexerHandle) -> bool {
	match GLOBAL_HANDLE.set(handle) {
		Ok(()) => {
			debug!("Indexer handle exposed for inspection");
			true
		}
		Err(_) => {
			warn!("Indexer handle already exposed; keeping the first one");
			false
		}
	}
}

/// The exposed handle, if any.
pub fn global() -> Option<&'static IndexerHandle> {
	GLOBAL_HANDLE.get()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::testing::MockSession;

	#[test]
	fn first_exposed_handle_wins() {
		let (first, _first_calls) = MockSession::new(0, None);
		let (second, _second_calls) = MockSession::new(0, None);
		first
			.channels()
			.set_status(crate::indexer::IndexingStatus::Loaded);

		assert!(expose(IndexerHandle::new(first)));
		assert!(!expose(IndexerHandle::new(second)));

		let exposed = global().unwrap();
		assert_eq!(
			*exposed.status().borrow(),
			crate::indexer::IndexingStatus::Loaded
		);
	}
}
