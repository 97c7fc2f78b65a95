//! Indexer Synchronization Module
//!
//! This module drives an indexer session from chain connection state. It is composed of several
//! submodules, each responsible for one aspect of the sync process:
//!
//! - `controller`: Gates initialization on the observed network and provider, then requests a
//!   catch-up pass on every relevant block.
//! - `events`: Event types and handler traits used to report controller lifecycle steps.
//! - `handle`: Application-facing view of the session's reactive state and operations.
//! - `inspect`: Optional process-wide access to that handle.
//! - `progress_tracker`: Counts passes and their outcomes and logs periodic summaries.
//! - `types`: Phases, policies and errors shared by the above.
//!
//! The controller is constructed once per process and never torn down.

/// Initialization gating and continuous indexing
pub mod controller;
/// Event system for lifecycle reporting
pub mod events;
/// Application-facing session handle
pub mod handle;
/// Process-wide inspection handle
pub mod inspect;
/// Tracks indexing progress and statistics
pub mod progress_tracker;
/// Shared types and errors
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::*;
pub use handle::IndexerHandle;
pub use types::*;
