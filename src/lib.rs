//! Keeps an indexer session synchronized with a chain.
//!
//! The crate observes which network and provider are available, initializes the indexer session
//! once the target chain is reachable, and requests a catch-up pass on each new block from then
//! on. Persistence and event ingestion belong to the session; this crate only sequences it.

pub mod config;
pub mod connection;
pub mod indexer;
pub mod persistence;
pub mod sync;
pub mod utils;
