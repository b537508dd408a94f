//! Common types used throughout collabdocs.

use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::SystemTime};
use uuid::Uuid;

use crate::prelude::*;

// DocId //
//*******//
/// Document identifier
///
/// Always holds a canonical (lower-case, hyphenated) UUID so that differently
/// spelled ids of the same document share one room and one set of records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(Box<str>);

impl DocId {
	/// Parses any well-formed UUID
	pub fn parse(s: &str) -> CdResult<Self> {
		let uuid = Uuid::parse_str(s.trim())
			.map_err(|_| Error::ValidationError("invalid docId".to_string()))?;
		Ok(Self(uuid.hyphenated().to_string().into()))
	}

	/// Parses a UUID and additionally requires version 4
	pub fn parse_v4(s: &str) -> CdResult<Self> {
		let uuid = Uuid::parse_str(s.trim())
			.map_err(|_| Error::ValidationError("invalid docId".to_string()))?;
		if uuid.get_version_num() != 4 {
			return Err(Error::ValidationError("invalid docId".to_string()));
		}
		Ok(Self(uuid.hyphenated().to_string().into()))
	}

	pub fn new_v4() -> Self {
		Self(Uuid::new_v4().hyphenated().to_string().into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for DocId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for DocId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl Serialize for DocId {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for DocId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		DocId::parse(&s).map_err(serde::de::Error::custom)
	}
}

// Timestamp //
//***********//
/// Seconds since the Unix epoch, serialized as an RFC3339 UTC string
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		now()
	}

	pub fn to_rfc3339(self) -> String {
		chrono::DateTime::<chrono::Utc>::from_timestamp(self.0, 0)
			.unwrap_or_default()
			.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_rfc3339())
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(&self.to_rfc3339())
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		let dt = chrono::DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)?;
		Ok(Timestamp(dt.timestamp()))
	}
}

pub fn now() -> Timestamp {
	let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
	Timestamp(i64::try_from(res.as_secs()).unwrap_or(i64::MAX))
}


// vim: ts=4
