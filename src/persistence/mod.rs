//! Persistence strategy handed to the indexer session.
//!
//! The session snapshots its progress and restores it on startup. Where it looks is described
//! by a `KeepState`: a namespace plus an ordered list of locations. The first location is the
//! preferred source of truth when restoring; later ones are fallbacks. The storage engine itself
//! belongs to the session.

mod locations;

pub use locations::*;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persistence strategy passed into the session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepState {
	/// Key under which the session stores its snapshot.
	pub namespace: String,
	/// Candidate locations in precedence order.
	pub locations: Vec<IndexedStateLocation>,
}

impl KeepState {
	/// The location consulted first when restoring.
	pub fn preferred(&self) -> Option<&IndexedStateLocation> {
		self.locations.first()
	}

	/// Locations in the order they are consulted when restoring.
	pub fn restore_order(&self) -> impl Iterator<Item = &IndexedStateLocation> {
		self.locations.iter()
	}
}

/// Build a persistence strategy for `namespace` over `locations`.
///
/// Duplicate locations are dropped, keeping the first occurrence so precedence is preserved.
pub fn keep_state_on_locations(
	namespace: impl Into<String>,
	locations: Vec<IndexedStateLocation>,
) -> Result<KeepState, PersistenceError> {
	let namespace = namespace.into();
	if namespace.trim().is_empty() {
		return Err(PersistenceError::EmptyNamespace);
	}

	let mut ordered: Vec<IndexedStateLocation> = Vec::with_capacity(locations.len());
	for location in locations {
		if ordered.contains(&location) {
			debug!("Dropping duplicate indexed state location {}", location.prefix);
			continue;
		}
		ordered.push(location);
	}

	if ordered.is_empty() {
		return Err(PersistenceError::NoLocations);
	}

	Ok(KeepState {
		namespace,
		locations: ordered,
	})
}

/// Error types for building persistence strategies
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
	#[error("Persistence namespace must not be empty")]
	EmptyNamespace,

	#[error("At least one indexed state location is required")]
	NoLocations,

	#[error("Invalid indexed state location: {0}")]
	InvalidLocation(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	fn location(prefix: &str) -> IndexedStateLocation {
		IndexedStateLocation::new(prefix).unwrap()
	}

	#[test]
	fn keeps_precedence_and_drops_duplicates() {
		let keep = keep_state_on_locations(
			"Game",
			vec![
				location("https://states.example.org/game/"),
				location("indexed-states/game/"),
				location("https://states.example.org/game"),
			],
		)
		.unwrap();

		assert_eq!(keep.locations.len(), 2);
		assert_eq!(keep.preferred().unwrap().prefix, "https://states.example.org/game/");
		let order: Vec<&str> = keep.restore_order().map(|l| l.prefix.as_str()).collect();
		assert_eq!(
			order,
			vec!["https://states.example.org/game/", "indexed-states/game/"]
		);
	}

	#[test]
	fn rejects_empty_inputs() {
		assert!(matches!(
			keep_state_on_locations(" ", vec![location("indexed-states/")]),
			Err(PersistenceError::EmptyNamespace)
		));
		assert!(matches!(
			keep_state_on_locations("Game", vec![]),
			Err(PersistenceError::NoLocations)
		));
	}

	#[test]
	fn serializes_for_session_config() {
		let keep = keep_state_on_locations("Game", vec![location("indexed-states/game/")]).unwrap();
		let json = serde_json::to_value(&keep).unwrap();
		assert_eq!(json["namespace"], "Game");
		assert_eq!(json["locations"][0]["prefix"], "indexed-states/game/");
	}
}
