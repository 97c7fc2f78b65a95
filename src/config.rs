//! Service configuration module
//! Environment-driven settings plus the contracts-info file describing what gets indexed

use crate::indexer::{
    ChainId, ContractDescriptor, IndexerError, IndexerLogConfig, SessionOptions,
    SourceDescription,
};
use crate::persistence::{PersistenceError, indexed_state_locations, keep_state_on_locations};
use crate::sync::{ControllerConfig, OverlapPolicy};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid contracts info: {0}")]
    InvalidContractsInfo(#[from] serde_json::Error),
    #[error("Invalid source description: {0}")]
    Indexer(#[from] IndexerError),
    #[error("Invalid indexed state locations: {0}")]
    Persistence(#[from] PersistenceError),
}

/// A deployed contract as listed in the contracts-info file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEntry {
    pub address: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    #[serde(default)]
    pub start_block: Option<u64>,
}

/// Deployment description: target chain, genesis hash and contracts keyed by name
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsInfo {
    /// Deployment name, also the folder of the embedded indexed state
    pub name: String,
    pub chain_id: ChainId,
    pub genesis_hash: String,
    pub contracts: BTreeMap<String, ContractEntry>,
}

impl ContractsInfo {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a contracts-info file
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let info = Self::from_json(&text)?;
        info!(
            "Loaded contracts info {} for chain {} ({} contracts)",
            info.name,
            info.chain_id,
            info.contracts.len()
        );
        Ok(info)
    }

    /// Source description handed to the indexer. Contracts are listed in key order.
    pub fn source_description(&self) -> Result<SourceDescription, ConfigError> {
        let contracts = self
            .contracts
            .iter()
            .map(|(name, entry)| ContractDescriptor {
                name: name.clone(),
                address: entry.address.clone(),
                abi: entry.abi.clone(),
                start_block: entry.start_block,
            })
            .collect();
        Ok(SourceDescription::new(
            self.chain_id,
            contracts,
            self.genesis_hash.clone(),
        )?)
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub contracts_path: PathBuf,
    /// Remote indexed state prefix, consulted before the embedded one
    pub remote_indexed_state: Option<String>,
    pub indexed_states_base: String,
    /// Namespace the session stores its snapshot under
    pub state_namespace: String,
    pub eth_rpc_url: String,
    pub eth_ws_url: String,
    pub indexer_url: String,
    pub indexer_ws_url: String,
    pub client_context: bool,
    pub expose_globals: bool,
    pub overlap: OverlapPolicy,
    pub log_level: u8,
    pub track_num_requests: bool,
    pub chain_poll_interval: Duration,
    /// First delay of the reconnect and init retry schedules
    pub retry_interval: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let overlap = get("STATE_SYNC_OVERLAP_POLICY", "delegate")
            .parse::<OverlapPolicy>()
            .map_err(ConfigError::InvalidConfig)?;

        let log_level = get("STATE_SYNC_LOG_LEVEL", "1")
            .parse::<u8>()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid log level: {}", e)))?;

        let poll_secs = get("STATE_SYNC_CHAIN_POLL_SECS", "5")
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid chain poll interval: {}", e)))?;
        if !(1..=300).contains(&poll_secs) {
            return Err(ConfigError::InvalidConfig(
                "Chain poll interval must be between 1 and 300 seconds".to_string(),
            ));
        }

        let retry_ms = get("STATE_SYNC_RETRY_MS", "500")
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid retry interval: {}", e)))?;
        if retry_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Retry interval must be at least 1 millisecond".to_string(),
            ));
        }

        let config = AppConfig {
            contracts_path: PathBuf::from(get("STATE_SYNC_CONTRACTS", "contracts.json")),
            remote_indexed_state: lookup("STATE_SYNC_REMOTE_INDEXED_STATE")
                .filter(|remote| !remote.trim().is_empty()),
            indexed_states_base: get("STATE_SYNC_INDEXED_STATES_BASE", "indexed-states/"),
            state_namespace: get("STATE_SYNC_NAMESPACE", "Game"),
            eth_rpc_url: get("STATE_SYNC_ETH_RPC_URL", "http://127.0.0.1:8545"),
            eth_ws_url: get("STATE_SYNC_ETH_WS_URL", "ws://127.0.0.1:8545"),
            indexer_url: get("STATE_SYNC_INDEXER_URL", "http://127.0.0.1:8080/graphql"),
            indexer_ws_url: get("STATE_SYNC_INDEXER_WS_URL", "ws://127.0.0.1:8080/graphql/ws"),
            client_context: parse_bool("STATE_SYNC_CLIENT_CONTEXT", &get("STATE_SYNC_CLIENT_CONTEXT", "true"))?,
            expose_globals: parse_bool("STATE_SYNC_EXPOSE_GLOBALS", &get("STATE_SYNC_EXPOSE_GLOBALS", "false"))?,
            overlap,
            log_level,
            track_num_requests: parse_bool(
                "STATE_SYNC_TRACK_NUM_REQUESTS",
                &get("STATE_SYNC_TRACK_NUM_REQUESTS", "true"),
            )?,
            chain_poll_interval: Duration::from_secs(poll_secs),
            retry_interval: Duration::from_millis(retry_ms),
        };

        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Assemble the controller configuration for a deployment.
    ///
    /// The remote indexed state, when set, is restored from before the embedded one.
    pub fn controller_config(&self, contracts: &ContractsInfo) -> Result<ControllerConfig, ConfigError> {
        let locations = indexed_state_locations(
            &self.indexed_states_base,
            &contracts.name,
            self.remote_indexed_state.as_deref(),
        )?;
        let keep_state = keep_state_on_locations(self.state_namespace.clone(), locations)?;

        Ok(ControllerConfig {
            target_chain: contracts.chain_id,
            source: contracts.source_description()?,
            log_config: IndexerLogConfig {
                log_level: self.log_level,
            },
            options: SessionOptions {
                track_num_requests: self.track_num_requests,
                keep_state,
            },
            client_context: self.client_context,
            overlap: self.overlap,
            init_retry_interval: self.retry_interval,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidConfig(format!("{}: expected a boolean, got {}", key, other))),
    }
}
