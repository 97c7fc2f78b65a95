use crate::indexer::IndexerError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle phase of the sync controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerPhase {
	/// Waiting for a provider on the target network.
	#[default]
	Uninitialized,
	/// Session `init` is in flight.
	Initializing,
	/// Indexing on every block. Terminal.
	Continuous,
}

impl fmt::Display for ControllerPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Uninitialized => write!(f, "uninitialized"),
			Self::Initializing => write!(f, "initializing"),
			Self::Continuous => write!(f, "continuous"),
		}
	}
}

/// What happens when a catch-up is requested while another is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
	/// Always call the session; it is responsible for deduplicating.
	#[default]
	Delegate,
	/// Skip the request while a pass issued by the controller is in flight.
	Coalesce,
}

impl FromStr for OverlapPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"delegate" => Ok(Self::Delegate),
			"coalesce" => Ok(Self::Coalesce),
			other => Err(format!("unknown overlap policy: {}", other)),
		}
	}
}

/// Why an indexing pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTrigger {
	/// First pass right after initialization.
	Initial,
	/// A new block arrived.
	Block(u64),
}

impl fmt::Display for PassTrigger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Initial => write!(f, "initial"),
			Self::Block(number) => write!(f, "block {}", number),
		}
	}
}

/// Why a requested pass was not issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
	/// The active network is not the target chain.
	WrongNetwork { chain_id: Option<String> },
	/// A previous pass is still running under `OverlapPolicy::Coalesce`.
	InFlight,
}

/// Error types for the sync controller
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Indexer error: {0}")]
	IndexerError(#[from] IndexerError),

	#[error("Event handler error: {0}")]
	HandlerError(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overlap_policy_parses_case_insensitively() {
		assert_eq!("Coalesce".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Coalesce));
		assert_eq!(" delegate ".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Delegate));
		assert!("queue".parse::<OverlapPolicy>().is_err());
	}
}
