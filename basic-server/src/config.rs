//! Server configuration from environment variables

use std::str::FromStr;

use collabdocs::prelude::*;

#[derive(Debug)]
pub struct Config {
	pub port: u16,
	pub db_dsn: Box<str>,
	pub cors_origins: Box<[Box<str>]>,
	pub log_level: Box<str>,
	pub max_binary_bytes: usize,
	pub max_text_bytes: usize,
	pub mailbox_capacity: usize,
}

fn var_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> CdResult<T> {
	match lookup(name) {
		Some(value) if !value.trim().is_empty() => value
			.trim()
			.parse()
			.map_err(|_| Error::ConfigError(format!("invalid {}: {:?}", name, value))),
		_ => Ok(default),
	}
}

impl Config {
	pub fn from_env() -> CdResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CdResult<Self> {
		let Some(db_dsn) = lookup("DB_DSN").filter(|dsn| !dsn.trim().is_empty()) else {
			return Err(Error::ConfigError("DB_DSN is required".to_string()));
		};
		let cors_origins = lookup("CORS_ORIGINS")
			.unwrap_or_else(|| "http://localhost:5173".to_string())
			.split(',')
			.map(str::trim)
			.filter(|origin| !origin.is_empty())
			.map(Into::into)
			.collect();

		let config = Config {
			port: var_or(&lookup, "APP_PORT", 8080)?,
			db_dsn: db_dsn.trim().into(),
			cors_origins,
			log_level: var_or(&lookup, "LOG_LEVEL", "info".to_string())?.into(),
			max_binary_bytes: var_or(&lookup, "WS_MAX_BIN_BYTES", 1024 * 1024)?,
			max_text_bytes: var_or(&lookup, "WS_MAX_TEXT_BYTES", 64 * 1024)?,
			mailbox_capacity: var_or(&lookup, "ROOM_MAILBOX", 256)?,
		};
		if config.max_binary_bytes == 0 || config.max_text_bytes == 0 || config.mailbox_capacity == 0 {
			return Err(Error::ConfigError("size limits must be positive".to_string()));
		}
		Ok(config)
	}

	pub fn listen(&self) -> String {
		format!("0.0.0.0:{}", self.port)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> =
			vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_defaults() {
		let config = Config::from_lookup(lookup(&[("DB_DSN", "sqlite://data/app.db")])).unwrap();

		assert_eq!(config.port, 8080);
		assert_eq!(&*config.db_dsn, "sqlite://data/app.db");
		assert_eq!(config.cors_origins.len(), 1);
		assert_eq!(&*config.cors_origins[0], "http://localhost:5173");
		assert_eq!(&*config.log_level, "info");
		assert_eq!(config.max_binary_bytes, 1_048_576);
		assert_eq!(config.max_text_bytes, 65_536);
		assert_eq!(config.mailbox_capacity, 256);
		assert_eq!(config.listen(), "0.0.0.0:8080");
	}

	#[test]
	fn test_overrides() {
		let config = Config::from_lookup(lookup(&[
			("DB_DSN", "app.db"),
			("APP_PORT", "9000"),
			("CORS_ORIGINS", "https://a.example, https://b.example,"),
			("WS_MAX_BIN_BYTES", "2048"),
			("ROOM_MAILBOX", "8"),
		]))
		.unwrap();

		assert_eq!(config.port, 9000);
		let origins: Vec<&str> = config.cors_origins.iter().map(|o| &**o).collect();
		assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
		assert_eq!(config.max_binary_bytes, 2048);
		assert_eq!(config.mailbox_capacity, 8);
	}

	#[test]
	fn test_missing_dsn() {
		let res = Config::from_lookup(lookup(&[("APP_PORT", "9000")]));
		assert!(matches!(res, Err(Error::ConfigError(_))));

		let res = Config::from_lookup(lookup(&[("DB_DSN", "  ")]));
		assert!(matches!(res, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_invalid_numbers() {
		for (name, value) in [("APP_PORT", "http"), ("APP_PORT", "70000"), ("WS_MAX_TEXT_BYTES", "-1"), ("ROOM_MAILBOX", "0")] {
			let res = Config::from_lookup(lookup(&[("DB_DSN", "app.db"), (name, value)]));
			assert!(matches!(res, Err(Error::ConfigError(_))), "{}={}", name, value);
		}
	}
}

// vim: ts=4
