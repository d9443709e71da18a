// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy service runtime settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_CONNECTION_CONFIG_PATH: &str = "config/connection_config.json";
pub const DEFAULT_LIVENESS_FILE: &str = "/tmp/app_server_live";
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PolicyConfig {
	/// Fallback connection configuration consulted by `NewAdapter` and default enforcers.
	pub connection_config_path: PathBuf,
	pub liveness_file: PathBuf,
	pub shutdown_grace: Duration,
	/// Upper bound on any single adapter call.
	pub io_timeout: Duration,
	pub init_default_enforcer: bool,
}

impl Default for PolicyConfig {
	fn default() -> Self {
		PolicyConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfigLayer {
	#[serde(default)]
	pub connection_config_path: Option<PathBuf>,
	#[serde(default)]
	pub liveness_file: Option<PathBuf>,
	#[serde(default)]
	pub shutdown_grace_secs: Option<u64>,
	#[serde(default)]
	pub io_timeout_secs: Option<u64>,
	#[serde(default)]
	pub init_default_enforcer: Option<bool>,
}

impl PolicyConfigLayer {
	pub fn merge(&mut self, other: PolicyConfigLayer) {
		if other.connection_config_path.is_some() {
			self.connection_config_path = other.connection_config_path;
		}
		if other.liveness_file.is_some() {
			self.liveness_file = other.liveness_file;
		}
		if other.shutdown_grace_secs.is_some() {
			self.shutdown_grace_secs = other.shutdown_grace_secs;
		}
		if other.io_timeout_secs.is_some() {
			self.io_timeout_secs = other.io_timeout_secs;
		}
		if other.init_default_enforcer.is_some() {
			self.init_default_enforcer = other.init_default_enforcer;
		}
	}

	pub fn finalize(self) -> PolicyConfig {
		PolicyConfig {
			connection_config_path: self
				.connection_config_path
				.unwrap_or_else(|| PathBuf::from(DEFAULT_CONNECTION_CONFIG_PATH)),
			liveness_file: self
				.liveness_file
				.unwrap_or_else(|| PathBuf::from(DEFAULT_LIVENESS_FILE)),
			shutdown_grace: Duration::from_secs(
				self.shutdown_grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
			),
			io_timeout: Duration::from_secs(self.io_timeout_secs.unwrap_or(DEFAULT_IO_TIMEOUT_SECS)),
			init_default_enforcer: self.init_default_enforcer.unwrap_or(true),
		}
	}
}
