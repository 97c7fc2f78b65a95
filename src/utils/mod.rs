//!
//! Utility module for the state sync service.
//!
//! Re-exports serialization helpers used to inspect indexed state and the reconnect schedule
//! shared by the long-lived subscriptions.
/// Exponential reconnect delays
pub mod reconnect;
/// JSON helpers with big-integer support
pub mod stringify;

pub use reconnect::Reconnect;
pub use stringify::{BigInt, parse, stringify};
