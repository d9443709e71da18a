// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Loom policy server.
//!
//! Server settings are layered from built-in defaults, a TOML file and
//! `LOOM_POLICY_*` environment variables. The fallback adapter connection lives
//! in a separate JSON file, see [`ConnectionConfig`].
//!
//! ```ignore
//! let config = loom_policy_config::load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod connection;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use connection::{interpolate_env, ConnectionConfig, LEGACY_CONNECTION_CONFIG_ENV};
pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub logging: LoggingConfig,
	pub policy: PolicyConfig,
	pub abac: AbacConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Loads configuration with the system config file `/etc/loom/policy-server.toml`.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let policy = layer.policy.unwrap_or_default().finalize();
	let abac = layer.abac.unwrap_or_default().finalize()?;

	if http.port == 0 {
		return Err(ConfigError::Validation(
			"http.port must be between 1 and 65535".to_string(),
		));
	}

	info!(
		host = %http.host,
		port = http.port,
		connection_config = %policy.connection_config_path.display(),
		liveness_file = %policy.liveness_file.display(),
		slot_width = abac.slot_width,
		"Policy server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		logging,
		policy,
		abac,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Fixed(ServerConfigLayer, Precedence);

	impl ConfigSource for Fixed {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.1
		}

		fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
			Ok(self.0.clone())
		}
	}

	fn port_layer(port: u16) -> ServerConfigLayer {
		ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: Some(port),
			}),
			..Default::default()
		}
	}

	#[test]
	fn higher_precedence_wins_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(Fixed(port_layer(7000), Precedence::Environment)),
			Box::new(Fixed(port_layer(6000), Precedence::ConfigFile)),
		])
		.unwrap();
		assert_eq!(config.http.port, 7000);
		assert_eq!(config.http.host, DEFAULT_HOST);
	}

	#[test]
	fn port_zero_is_rejected() {
		let result = load_from_sources(vec![Box::new(Fixed(port_layer(0), Precedence::ConfigFile))]);
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn toml_file_sections() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("policy-server.toml");
		std::fs::write(
			&path,
			r#"
[http]
port = 6100

[logging]
level = "debug"

[abac]
slot_width = 12
"#,
		)
		.unwrap();

		let config = load_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(&path)),
		])
		.unwrap();
		assert_eq!(config.http.port, 6100);
		assert_eq!(config.logging.level, "debug");
		assert_eq!(config.abac.slot_width, 12);
		assert_eq!(config.socket_addr(), "0.0.0.0:6100");
	}
}
