//! Indexer session integration
//!
//! This module defines the `IndexerSession` seam the sync controller drives, the types passed
//! across it, and a client for a remote indexer service that implements it over GraphQL.
//! Event ingestion itself happens inside the session.

/// GraphQL client for a remote indexer session
mod client;
/// The session trait and its reactive channels
mod session;
/// Type definitions for session data structures
mod types;

pub use client::GraphQlIndexerSession;
pub use session::{IndexerSession, SessionChannels};
pub use types::*;
