//! Types shared between the sync controller and indexer session implementations

use crate::persistence::KeepState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric chain identifier.
///
/// Wallets usually report chain ids as `0x`-prefixed hex while configuration files carry
/// decimal strings; both parse to the same value so they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(u64);

impl ChainId {
	pub const fn new(id: u64) -> Self {
		Self(id)
	}

	/// Hex form as returned by `eth_chainId`.
	pub fn to_hex(&self) -> String {
		format!("0x{:x}", self.0)
	}
}

impl FromStr for ChainId {
	type Err = IndexerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		let parsed = match trimmed
			.strip_prefix("0x")
			.or_else(|| trimmed.strip_prefix("0X"))
		{
			Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
			None => trimmed.parse::<u64>(),
		};
		parsed
			.map(ChainId)
			.map_err(|_| IndexerError::InvalidChainId(s.to_string()))
	}
}

impl TryFrom<String> for ChainId {
	type Error = IndexerError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<ChainId> for String {
	fn from(value: ChainId) -> Self {
		value.to_string()
	}
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A contract whose events the indexer ingests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDescriptor {
	/// Name of the contract in the deployment file.
	pub name: String,
	/// Deployed address.
	pub address: String,
	/// Contract ABI, passed through untouched.
	pub abi: serde_json::Value,
	/// Block the contract was deployed at, if known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start_block: Option<u64>,
}

/// Describes what the indexer reads. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescription {
	pub chain_id: ChainId,
	pub contracts: Vec<ContractDescriptor>,
	/// Hash of the genesis block of the target chain.
	pub genesis_hash: String,
}

impl SourceDescription {
	/// Build a source description, validating the genesis marker.
	pub fn new(
		chain_id: ChainId,
		contracts: Vec<ContractDescriptor>,
		genesis_hash: impl Into<String>,
	) -> Result<Self, IndexerError> {
		let genesis_hash = genesis_hash.into();
		let digits = genesis_hash
			.strip_prefix("0x")
			.unwrap_or(genesis_hash.as_str());
		let bytes = hex::decode(digits)
			.map_err(|e| IndexerError::InvalidGenesisHash(format!("{}: {}", genesis_hash, e)))?;
		if bytes.len() != 32 {
			return Err(IndexerError::InvalidGenesisHash(format!(
				"{}: expected 32 bytes, got {}",
				genesis_hash,
				bytes.len()
			)));
		}

		Ok(Self {
			chain_id,
			contracts,
			genesis_hash,
		})
	}
}

/// Logging knobs forwarded to the indexer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerLogConfig {
	pub log_level: u8,
}

impl Default for IndexerLogConfig {
	fn default() -> Self {
		Self { log_level: 1 }
	}
}

/// Session-wide options set when the indexer is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
	/// Count RPC requests made by the indexer and report them in `SyncingState`.
	pub track_num_requests: bool,
	/// Where the indexer snapshots and restores its progress.
	pub keep_state: KeepState,
}

/// Serializable description of the provider handed to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
	pub endpoint: String,
}

/// Arguments of the session `init` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitArgs {
	pub provider: ProviderInfo,
	pub source: SourceDescription,
	pub config: IndexerLogConfig,
	pub options: SessionOptions,
}

/// Position reached by the last indexing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSync {
	pub latest_block: u64,
	pub last_to_block: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub num_requests: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub synced_at: Option<DateTime<Utc>>,
}

/// Coarse indexing status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum IndexingStatus {
	#[default]
	Idle,
	Loading,
	Fetching,
	Processing,
	Loaded,
}

/// Detailed syncing progress reported by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncingState {
	pub waiting_for_provider: bool,
	pub processing_first_time: bool,
	pub loading: bool,
	pub fetching_logs: bool,
	pub catching_up: bool,
	pub last_sync: Option<LastSync>,
	pub num_requests: Option<u64>,
	pub error: Option<String>,
}

impl Default for SyncingState {
	fn default() -> Self {
		Self {
			waiting_for_provider: true,
			processing_first_time: false,
			loading: false,
			fetching_logs: false,
			catching_up: false,
			last_sync: None,
			num_requests: None,
			error: None,
		}
	}
}

/// One update pushed by the session's update subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerUpdate {
	#[serde(default)]
	pub state: Option<serde_json::Value>,
	#[serde(default)]
	pub syncing: Option<SyncingState>,
	#[serde(default)]
	pub status: Option<IndexingStatus>,
}

/// Error types for indexer session operations
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
	#[error("GraphQL error: {0}")]
	GraphQLError(String),

	#[error("No data returned")]
	NoData,

	#[error("WebSocket error: {0}")]
	WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Session error: {0}")]
	SessionError(String),

	#[error("Invalid chain id: {0}")]
	InvalidChainId(String),

	#[error("Invalid genesis hash: {0}")]
	InvalidGenesisHash(String),
}
