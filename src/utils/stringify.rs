use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Integer too large to round-trip through a JSON number.
///
/// Serializes as its decimal form followed by `n`, so `BigInt(123)` becomes `"123n"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigInt(pub i128);

impl From<i128> for BigInt {
	fn from(value: i128) -> Self {
		Self(value)
	}
}

impl From<u64> for BigInt {
	fn from(value: u64) -> Self {
		Self(value as i128)
	}
}

impl fmt::Display for BigInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}n", self.0)
	}
}

impl Serialize for BigInt {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

struct BigIntVisitor;

impl Visitor<'_> for BigIntVisitor {
	type Value = BigInt;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("an integer or a decimal string ending in `n`")
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigInt, E> {
		Ok(BigInt(v as i128))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigInt, E> {
		Ok(BigInt(v as i128))
	}

	fn visit_i128<E: de::Error>(self, v: i128) -> Result<BigInt, E> {
		Ok(BigInt(v))
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<BigInt, E> {
		let digits = v
			.strip_suffix('n')
			.ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))?;
		digits
			.parse::<i128>()
			.map(BigInt)
			.map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
	}
}

impl<'de> Deserialize<'de> for BigInt {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(BigIntVisitor)
	}
}

/// Serialize a value as pretty JSON with 2-space indentation.
pub fn stringify<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
	serde_json::to_string_pretty(value)
}

/// Inverse of `stringify`.
pub fn parse<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
	serde_json::from_str(text)
}
