use indexer_state_sync::config::{AppConfig, ContractsInfo};
use indexer_state_sync::connection::{
	self, BlockWatcher, ConnectionObserver, HttpProvider, ProviderHandle,
};
use indexer_state_sync::indexer::GraphQlIndexerSession;
use indexer_state_sync::sync::{SyncController, inspect};
use indexer_state_sync::utils::stringify;

use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting state sync service");

	let config = match AppConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load configuration: {}", e);
			return;
		}
	};

	let contracts = match ContractsInfo::load(&config.contracts_path).await {
		Ok(contracts) => contracts,
		Err(e) => {
			error!("Failed to load contracts info: {}", e);
			return;
		}
	};

	let controller_config = match config.controller_config(&contracts) {
		Ok(controller_config) => controller_config,
		Err(e) => {
			error!("Invalid deployment configuration: {}", e);
			return;
		}
	};

	let session = match GraphQlIndexerSession::new(
		config.indexer_url.clone(),
		config.indexer_ws_url.clone(),
	) {
		Ok(session) => Arc::new(session.with_retry_interval(config.retry_interval)),
		Err(e) => {
			error!("Failed to create indexer session: {}", e);
			return;
		}
	};

	info!("Created indexer session");

	let observer = Arc::new(ConnectionObserver::new());
	let controller = SyncController::new(session, observer.clone(), controller_config);

	if config.expose_globals {
		inspect::expose(controller.handle());
	}

	let _gating = controller.start();

	let provider: ProviderHandle = match HttpProvider::new(config.eth_rpc_url.clone()) {
		Ok(provider) => Arc::new(provider),
		Err(e) => {
			error!("Failed to create provider: {}", e);
			return;
		}
	};

	// The network poller publishes the chain once the node answers.
	if let Err(e) = connection::connect_provider(&observer, provider.clone()).await {
		warn!("Initial chain id query failed: {}", e);
		observer.set_provider(Some(provider.clone()));
	}

	let _network_poller =
		connection::watch_network(observer.clone(), provider, config.chain_poll_interval);
	let _block_watcher = BlockWatcher::new(config.eth_ws_url.clone(), observer.clone())
		.with_retry_interval(config.retry_interval)
		.spawn();

	if let Err(e) = tokio::signal::ctrl_c().await {
		error!("Failed to listen for shutdown signal: {}", e);
	}

	info!("Shutting down: {}", controller.stats().await.summary());

	let state = controller.handle().state().borrow().clone();
	match stringify(&state) {
		Ok(text) => info!("Final indexed state:\n{}", text),
		Err(e) => warn!("Failed to serialize indexed state: {}", e),
	}
}
