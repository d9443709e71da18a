// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fallback connection configuration.
//!
//! ```json
//! {
//!   "driver": "postgres",
//!   "connection": "postgres://$DB_USER:$DB_PASSWORD@db:5432/",
//!   "enforcer": "config/rbac_model.conf",
//!   "dbSpecified": false
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable naming the connection configuration file, kept for existing deployments.
pub const LEGACY_CONNECTION_CONFIG_ENV: &str = "CONNECTION_CONFIG_PATH";

static ENV_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$(\w+)").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
	#[serde(alias = "Driver")]
	pub driver: String,
	#[serde(alias = "Connection")]
	pub connection: String,
	/// Path of the model file used when a caller supplies no model text.
	#[serde(alias = "Enforcer")]
	pub enforcer: String,
	#[serde(rename = "dbSpecified", alias = "DBSpecified", alias = "db_specified")]
	pub db_specified: bool,
}

impl ConnectionConfig {
	/// Reads `path` and expands `$NAME` tokens in `connection` from the process environment.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		Self::load_with(path, |name| std::env::var(name).ok())
	}

	pub fn load_with(
		path: impl AsRef<Path>,
		lookup: impl Fn(&str) -> Option<String>,
	) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		debug!(path = %path.display(), "loading connection config");
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: PathBuf::from(path),
			source: e,
		})?;
		let mut config: ConnectionConfig =
			serde_json::from_str(&content).map_err(|e| ConfigError::JsonParse {
				path: PathBuf::from(path),
				source: e,
			})?;
		config.connection = interpolate_env(&config.connection, lookup);
		Ok(config)
	}
}

/// Replaces every `$NAME` with `lookup(NAME)`, or the empty string when unset.
pub fn interpolate_env(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
	ENV_TOKEN
		.replace_all(template, |caps: &Captures<'_>| lookup(&caps[1]).unwrap_or_default())
		.into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| map.get(name).cloned()
	}

	#[test]
	fn interpolates_known_and_blanks_unknown() {
		let lookup = env(&[("DB_USER", "policy"), ("DB_HOST", "db")]);
		assert_eq!(
			interpolate_env("postgres://$DB_USER:$DB_PASS@$DB_HOST:5432/", lookup),
			"postgres://policy:@db:5432/"
		);
	}

	#[test]
	fn loads_file_with_either_key_style() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("connection_config.json");
		std::fs::write(
			&path,
			r#"{"Driver": "file", "Connection": "$POLICY_DIR/policy.csv", "Enforcer": "model.conf", "DBSpecified": true}"#,
		)
		.unwrap();

		let config = ConnectionConfig::load_with(&path, env(&[("POLICY_DIR", "/srv")])).unwrap();
		assert_eq!(
			config,
			ConnectionConfig {
				driver: "file".to_string(),
				connection: "/srv/policy.csv".to_string(),
				enforcer: "model.conf".to_string(),
				db_specified: true,
			}
		);
	}

	#[test]
	fn missing_file_is_a_read_error() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			ConnectionConfig::load(dir.path().join("nope.json")),
			Err(ConfigError::FileRead { .. })
		));
	}

	#[test]
	fn malformed_json_is_a_parse_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("bad.json");
		std::fs::write(&path, "{ not json").unwrap();
		assert!(matches!(
			ConnectionConfig::load(&path),
			Err(ConfigError::JsonParse { .. })
		));
	}

	mod proptest_tests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn text_without_tokens_is_unchanged(text in "[^$]{0,40}") {
				prop_assert_eq!(interpolate_env(&text, |_| Some("x".to_string())), text);
			}

			#[test]
			fn every_token_is_replaced(names in prop::collection::vec("[A-Z][A-Z_]{0,8}", 1..5)) {
				let template: String = names.iter().map(|n| format!("${n}/")).collect();
				let out = interpolate_env(&template, |_| None);
				prop_assert_eq!(out, "/".repeat(names.len()));
			}
		}
	}
}
