//! Sync controller: sequences the connection observer and the indexer session.
//!
//! The controller watches the observed network. The first time the network matches the target
//! chain while a provider is available (and the process runs in a client context), it
//! initializes the indexer session. Once `init` resolves it requests a catch-up pass and then
//! one more on every block announced while the network still matches.
//!
//! A failed `init` is logged, reported as `InitializationFailed`, and rolls the controller back to
//! `Uninitialized`. The gating check then runs again after a backoff delay, or earlier if the
//! network changes. Failed passes are reported as `PassFailed`; the next block issues a new one.

use crate::connection::{ConnectionObserver, NetworkState, NewBlock, ProviderHandle};
use crate::indexer::{
    ChainId, IndexerLogConfig, IndexerSession, InitArgs, ProviderInfo, SessionOptions,
    SourceDescription,
};
use crate::utils::Reconnect;
use crate::sync::{
    events::{EventDispatcher, SyncEvent, SyncEventHandler, TracingEventHandler},
    handle::IndexerHandle,
    progress_tracker::{SyncProgressTracker, SyncStats},
    types::{ControllerPhase, OverlapPolicy, PassTrigger, SkipReason, SyncError},
};

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

/// Static configuration of the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Chain the session indexes; gating and block handling compare against it.
    pub target_chain: ChainId,
    pub source: SourceDescription,
    pub log_config: IndexerLogConfig,
    pub options: SessionOptions,
    /// Gating only runs in a client context (not during build or prerender steps).
    pub client_context: bool,
    pub overlap: OverlapPolicy,
    /// First delay before re-running the gating check after a failed `init`.
    pub init_retry_interval: Duration,
}

/// Coordinates initialization and continuous indexing of the indexer session.
///
/// One instance per process, shared through `Arc`. Construct it once at startup; there is no
/// teardown.
pub struct SyncController {
    session: Arc<dyn IndexerSession>,
    observer: Arc<ConnectionObserver>,
    config: ControllerConfig,

    /// Set when an initialization attempt starts, cleared again if it fails.
    attempted: AtomicBool,
    /// Single-slot in-flight flag, only used with `OverlapPolicy::Coalesce`.
    indexing: AtomicBool,
    phase: watch::Sender<ControllerPhase>,
    init_retry: Mutex<Reconnect>,
    /// Signalled when a failed initialization is due for another attempt.
    retry_due: Notify,

    dispatcher: Mutex<EventDispatcher>,
    progress: Mutex<SyncProgressTracker>,
}

impl SyncController {
    pub fn new(
        session: Arc<dyn IndexerSession>,
        observer: Arc<ConnectionObserver>,
        config: ControllerConfig,
    ) -> Arc<Self> {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(TracingEventHandler));

        let init_retry = Reconnect::new(config.init_retry_interval);
        Arc::new(Self {
            session,
            observer,
            config,
            attempted: AtomicBool::new(false),
            indexing: AtomicBool::new(false),
            phase: watch::Sender::new(ControllerPhase::Uninitialized),
            init_retry: Mutex::new(init_retry),
            retry_due: Notify::new(),
            dispatcher: Mutex::new(dispatcher),
            progress: Mutex::new(SyncProgressTracker::new()),
        })
    }

    /// Register an additional event handler.
    pub async fn register_handler(&self, handler: Box<dyn SyncEventHandler>) {
        self.dispatcher.lock().await.register_handler(handler);
    }

    /// Application-facing handle on the session.
    pub fn handle(&self) -> IndexerHandle {
        IndexerHandle::new(self.session.clone())
    }

    pub fn phase(&self) -> watch::Receiver<ControllerPhase> {
        self.phase.subscribe()
    }

    pub async fn stats(&self) -> SyncStats {
        self.progress.lock().await.get_stats()
    }

    /// Subscribe to network changes and gate initialization on them.
    ///
    /// The current network state is checked immediately, then again on every change and whenever
    /// a failed initialization is due for retry. Returns `None` outside a client context, where
    /// nothing is subscribed.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.client_context {
            info!("Not running in a client context, indexer will not be initialized");
            return None;
        }

        let mut network = self.observer.subscribe_network();
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                let state = network.borrow_and_update().clone();
                this.on_network_change(state).await;

                loop {
                    tokio::select! {
                        changed = network.changed() => {
                            if changed.is_err() {
                                debug!("Network state channel closed, gating stopped");
                                return;
                            }
                            break;
                        }
                        _ = this.retry_due.notified() => {
                            debug!("Retrying indexer initialization");
                            this.gate(this.observer.network_state()).await;
                        }
                    }
                }
            }
        }))
    }

    /// Gating step run for each observed network state.
    ///
    /// Errors raised while checking are reported and swallowed so the subscription survives.
    async fn on_network_change(self: &Arc<Self>, state: NetworkState) {
        self.emit(SyncEvent::NetworkChanged {
            chain_id: state.chain_id.clone(),
        })
        .await;
        self.gate(state).await;
    }

    async fn gate(self: &Arc<Self>, state: NetworkState) {
        match self.check_gate(&state) {
            Ok(Some(provider)) => self.initialize(provider).await,
            Ok(None) => {}
            Err(e) => {
                self.emit(SyncEvent::GatingFailed {
                    error: e.to_string(),
                })
                .await
            }
        }
    }

    /// Returns the provider to initialize with if every precondition holds, claiming the
    /// single initialization attempt in the process.
    fn check_gate(&self, state: &NetworkState) -> Result<Option<ProviderHandle>, SyncError> {
        if !self.is_target_network(state)? {
            return Ok(None);
        }

        let Some(provider) = self.observer.connection_state().provider else {
            debug!("On target network but no provider yet");
            return Ok(None);
        };

        if self.attempted.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        Ok(Some(provider))
    }

    fn is_target_network(&self, state: &NetworkState) -> Result<bool, SyncError> {
        match &state.chain_id {
            None => Ok(false),
            Some(raw) => Ok(raw.parse::<ChainId>()? == self.config.target_chain),
        }
    }

    /// Initialize the session with `provider`, then start continuous indexing.
    async fn initialize(self: &Arc<Self>, provider: ProviderHandle) {
        self.phase.send_replace(ControllerPhase::Initializing);
        self.emit(SyncEvent::InitializationStarted {
            chain_id: self.config.target_chain,
        })
        .await;

        let args = InitArgs {
            provider: ProviderInfo {
                endpoint: provider.endpoint().to_string(),
            },
            source: self.config.source.clone(),
            config: self.config.log_config.clone(),
            options: self.config.options.clone(),
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.session.init(args).await {
                Ok(last_sync) => {
                    this.emit(SyncEvent::Initialized {
                        last_sync,
                        at: Utc::now(),
                    })
                    .await;
                    this.index_continuously().await;
                }
                Err(e) => {
                    // Clear the claim before leaving Initializing so observers of the phase can
                    // retry immediately.
                    this.attempted.store(false, Ordering::SeqCst);
                    this.phase.send_replace(ControllerPhase::Uninitialized);
                    this.emit(SyncEvent::InitializationFailed {
                        error: e.to_string(),
                    })
                    .await;

                    let delay = this.init_retry.lock().await.next_delay();
                    info!("Retrying indexer initialization in {:?}", delay);
                    sleep(delay).await;
                    this.retry_due.notify_one();
                }
            }
        });
    }

    /// Request a first pass, then one per block while on the target network.
    async fn index_continuously(self: &Arc<Self>) {
        self.request_pass(PassTrigger::Initial).await;

        let this = Arc::clone(self);
        self.observer.on_new_block(move |block| {
            let this = Arc::clone(&this);
            async move { this.on_block(block).await }
        });

        self.phase.send_replace(ControllerPhase::Continuous);
        info!("Continuous indexing started");
    }

    async fn on_block(self: &Arc<Self>, block: NewBlock) {
        {
            let mut progress = self.progress.lock().await;
            progress.record_block(block.number);
            progress.log_progress(false);
        }

        let trigger = PassTrigger::Block(block.number);
        let network = self.observer.network_state();
        if self.is_target_network(&network).unwrap_or(false) {
            self.request_pass(trigger).await;
        } else {
            self.progress.lock().await.record_skipped();
            self.emit(SyncEvent::PassSkipped {
                trigger,
                reason: SkipReason::WrongNetwork {
                    chain_id: network.chain_id,
                },
            })
            .await;
        }
    }

    /// Issue one catch-up pass without waiting for it.
    async fn request_pass(self: &Arc<Self>, trigger: PassTrigger) {
        let coalesce = self.config.overlap == OverlapPolicy::Coalesce;
        if coalesce && self.indexing.swap(true, Ordering::SeqCst) {
            self.progress.lock().await.record_skipped();
            self.emit(SyncEvent::PassSkipped {
                trigger,
                reason: SkipReason::InFlight,
            })
            .await;
            return;
        }

        self.progress.lock().await.record_requested();
        self.emit(SyncEvent::PassRequested { trigger }).await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.session.index_more_and_catchup_if_needed().await;
            if coalesce {
                this.indexing.store(false, Ordering::SeqCst);
            }

            match result {
                Ok(()) => {
                    this.progress.lock().await.record_completed();
                    this.emit(SyncEvent::PassCompleted { trigger }).await;
                }
                Err(e) => {
                    this.progress.lock().await.record_failed();
                    this.emit(SyncEvent::PassFailed {
                        trigger,
                        error: e.to_string(),
                    })
                    .await;
                }
            }
        });
    }

    async fn emit(&self, event: SyncEvent) {
        self.dispatcher.lock().await.dispatch(&event).await;
    }
}
