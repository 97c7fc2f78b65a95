//! Event system for state synchronization.
//!
//! The controller reports every lifecycle step as a `SyncEvent`. Events are dispatched to
//! registered handlers, which keeps logging and application-side observers out of the
//! controller's control flow.

use crate::indexer::{ChainId, LastSync};
use crate::sync::types::{PassTrigger, SkipReason, SyncError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events that occur during state synchronization
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The observed network changed
    NetworkChanged { chain_id: Option<String> },
    /// The gating check itself failed; the subscription keeps running
    GatingFailed { error: String },
    /// Session `init` was issued
    InitializationStarted { chain_id: ChainId },
    /// Session `init` resolved
    Initialized {
        last_sync: Option<LastSync>,
        at: DateTime<Utc>,
    },
    /// Session `init` failed; initialization may be retried
    InitializationFailed { error: String },
    /// A catch-up pass was issued
    PassRequested { trigger: PassTrigger },
    /// A catch-up pass was not issued
    PassSkipped {
        trigger: PassTrigger,
        reason: SkipReason,
    },
    /// A catch-up pass resolved
    PassCompleted { trigger: PassTrigger },
    /// A catch-up pass failed; the next block retries
    PassFailed { trigger: PassTrigger, error: String },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order for each event.
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub async fn dispatch(&mut self, event: &SyncEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every event through `tracing`.
pub struct TracingEventHandler;

#[async_trait::async_trait]
impl SyncEventHandler for TracingEventHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
        match event {
            SyncEvent::NetworkChanged { chain_id } => {
                debug!("Network changed to {:?}", chain_id)
            }
            SyncEvent::GatingFailed { error } => error!("caught exception: {}", error),
            SyncEvent::InitializationStarted { chain_id } => {
                info!("Initializing indexer for chain {}", chain_id)
            }
            SyncEvent::Initialized { last_sync, .. } => {
                info!(target: "state", "initialised {:?}", last_sync)
            }
            SyncEvent::InitializationFailed { error } => {
                error!("Indexer initialization failed: {}", error)
            }
            SyncEvent::PassRequested { trigger } => debug!("Indexing pass requested ({})", trigger),
            SyncEvent::PassSkipped { trigger, reason } => {
                debug!("Indexing pass skipped ({}): {:?}", trigger, reason)
            }
            SyncEvent::PassCompleted { trigger } => debug!("Indexing pass completed ({})", trigger),
            SyncEvent::PassFailed { trigger, error } => {
                warn!("Indexing pass failed ({}): {}", trigger, error)
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TracingEventHandler"
    }
}

/// Forwards events to a channel so the application can observe the controller.
pub struct ChannelEventHandler {
    sender: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelEventHandler {
    pub fn new(sender: mpsc::UnboundedSender<SyncEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl SyncEventHandler for ChannelEventHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
        self.sender
            .send(event.clone())
            .map_err(|_| SyncError::HandlerError("event receiver dropped".to_string()))
    }

    fn name(&self) -> &'static str {
        "ChannelEventHandler"
    }
}
