use super::PersistenceError;

use serde::{Deserialize, Serialize};

/// Where an indexed state snapshot may be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedStateLocation {
	/// URL or path prefix, always ending in `/`.
	pub prefix: String,
}

/// Whether a location is fetched over the network or read locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
	Remote,
	Local,
}

impl IndexedStateLocation {
	pub fn new(prefix: impl Into<String>) -> Result<Self, PersistenceError> {
		let mut prefix = prefix.into().trim().to_string();
		if prefix.is_empty() {
			return Err(PersistenceError::InvalidLocation(
				"empty prefix".to_string(),
			));
		}
		if prefix.contains(char::is_whitespace) {
			return Err(PersistenceError::InvalidLocation(prefix));
		}
		if !prefix.ends_with('/') {
			prefix.push('/');
		}
		Ok(Self { prefix })
	}

	pub fn kind(&self) -> LocationKind {
		if self.prefix.starts_with("http://") || self.prefix.starts_with("https://") {
			LocationKind::Remote
		} else {
			LocationKind::Local
		}
	}
}

/// Build the ordered location list for a deployment.
///
/// The embedded location `{base}{name}/` is always present. A remote location, when configured
/// and non-empty, takes precedence and is placed first.
pub fn indexed_state_locations(
	base: &str,
	name: &str,
	remote: Option<&str>,
) -> Result<Vec<IndexedStateLocation>, PersistenceError> {
	let base = base.trim();
	let separator = if base.is_empty() || base.ends_with('/') {
		""
	} else {
		"/"
	};
	let embedded = IndexedStateLocation::new(format!("{}{}{}/", base, separator, name))?;

	let mut locations = vec![embedded];
	if let Some(remote) = remote.map(str::trim).filter(|r| !r.is_empty()) {
		locations.insert(0, IndexedStateLocation::new(remote)?);
	}
	Ok(locations)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_location_takes_precedence() {
		let locations = indexed_state_locations(
			"/srv/indexed-states/",
			"Game",
			Some("https://cdn.example.org/states"),
		)
		.unwrap();
		assert_eq!(locations.len(), 2);
		assert_eq!(locations[0].prefix, "https://cdn.example.org/states/");
		assert_eq!(locations[0].kind(), LocationKind::Remote);
		assert_eq!(locations[1].prefix, "/srv/indexed-states/Game/");
		assert_eq!(locations[1].kind(), LocationKind::Local);
	}

	#[test]
	fn empty_remote_is_ignored() {
		let locations = indexed_state_locations("indexed-states", "Game", Some("  ")).unwrap();
		assert_eq!(locations.len(), 1);
		assert_eq!(locations[0].prefix, "indexed-states/Game/");

		let locations = indexed_state_locations("indexed-states/", "Game", None).unwrap();
		assert_eq!(locations[0].prefix, "indexed-states/Game/");
	}

	#[test]
	fn rejects_whitespace_prefix() {
		assert!(IndexedStateLocation::new("").is_err());
		assert!(IndexedStateLocation::new("indexed states/").is_err());
	}
}
