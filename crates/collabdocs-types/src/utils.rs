//! Utility functions

use uuid::Uuid;

use crate::meta_adapter::DEFAULT_DOC_TITLE;
use crate::prelude::*;

pub const MAX_TITLE_LENGTH: usize = 120;

/// Random UUID v4 in hyphenated form, used for connection and comment ids
pub fn random_id() -> String {
	Uuid::new_v4().hyphenated().to_string()
}

/// Canonical form of a UUID v4 id, `invalid <field>` otherwise
pub fn parse_uuid_v4(field: &str, value: &str) -> CdResult<String> {
	match Uuid::parse_str(value.trim()) {
		Ok(uuid) if uuid.get_version_num() == 4 => Ok(uuid.hyphenated().to_string()),
		_ => Err(Error::ValidationError(format!("invalid {}", field))),
	}
}

/// Fails with a validation error if `value` is longer than `max` characters
pub fn check_max_chars(field: &str, value: &str, max: usize) -> CdResult<()> {
	if value.chars().count() > max {
		return Err(Error::ValidationError(format!("{} must be at most {} characters", field, max)));
	}
	Ok(())
}

/// Trims a document title, falling back to the default title when it is empty
pub fn normalize_title(title: Option<&str>) -> CdResult<String> {
	let title = title.map(str::trim).unwrap_or_default();
	if title.is_empty() {
		return Ok(DEFAULT_DOC_TITLE.to_string());
	}
	check_max_chars("title", title, MAX_TITLE_LENGTH)?;
	Ok(title.to_string())
}


// vim: ts=4
