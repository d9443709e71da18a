// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::connection::LEGACY_CONNECTION_CONFIG_ENV;
use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{AbacConfigLayer, HttpConfigLayer, LoggingConfigLayer, PolicyConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/policy-server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `LOOM_POLICY_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_env(|name| std::env::var(name).ok())
	}
}

struct Env<F> {
	lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T: std::str::FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}
}

pub(crate) fn layer_from_env(
	lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServerConfigLayer, ConfigError> {
	let env = Env { lookup };

	Ok(ServerConfigLayer {
		http: Some(HttpConfigLayer {
			host: env.var("LOOM_POLICY_HOST"),
			port: env.parse("LOOM_POLICY_PORT", "u16")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: env.var("LOOM_POLICY_LOG_LEVEL"),
		}),
		policy: Some(PolicyConfigLayer {
			connection_config_path: env
				.var("LOOM_POLICY_CONNECTION_CONFIG_PATH")
				.or_else(|| env.var(LEGACY_CONNECTION_CONFIG_ENV))
				.map(PathBuf::from),
			liveness_file: env.var("LOOM_POLICY_LIVENESS_FILE").map(PathBuf::from),
			shutdown_grace_secs: env.parse("LOOM_POLICY_SHUTDOWN_GRACE_SECS", "u64")?,
			io_timeout_secs: env.parse("LOOM_POLICY_IO_TIMEOUT_SECS", "u64")?,
			init_default_enforcer: env.bool("LOOM_POLICY_INIT_DEFAULT_ENFORCER"),
		}),
		abac: Some(AbacConfigLayer {
			slot_width: env.parse("LOOM_POLICY_ABAC_SLOT_WIDTH", "usize")?,
		}),
	})
}
