// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds persistence adapters from a request and the fallback connection file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use loom_policy_adapters::{Driver, SUPPORTED_DRIVERS};
use loom_policy_config::ConnectionConfig;
use loom_policy_core::Adapter;
use tracing::{debug, info, instrument};

use crate::deadline;
use crate::error::PolicyError;

/// Backend selection as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterRequest {
	pub driver: String,
	pub connection: String,
	pub db_specified: bool,
}

pub struct AdapterFactory {
	connection_config_path: PathBuf,
	io_timeout: Duration,
}

impl AdapterFactory {
	pub fn new(connection_config_path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
		Self {
			connection_config_path: connection_config_path.into(),
			io_timeout,
		}
	}

	pub fn connection_config_path(&self) -> &Path {
		&self.connection_config_path
	}

	/// Reads the fallback connection file. Called on first use, never at startup.
	pub fn fallback(&self) -> Result<ConnectionConfig, PolicyError> {
		Ok(ConnectionConfig::load(&self.connection_config_path)?)
	}

	/// Fills in the backend from the fallback file unless the request names
	/// both a driver and a connection string.
	pub fn resolve(&self, request: AdapterRequest) -> Result<AdapterRequest, PolicyError> {
		if !request.driver.is_empty() && !request.connection.is_empty() {
			return Ok(request);
		}
		let fallback = self.fallback()?;
		debug!(
			path = %self.connection_config_path.display(),
			driver = %fallback.driver,
			"using fallback connection configuration"
		);
		Ok(AdapterRequest {
			driver: fallback.driver,
			connection: fallback.connection,
			db_specified: fallback.db_specified,
		})
	}

	/// Returns a ready adapter or an error; nothing is half-built on failure.
	#[instrument(skip(self, request), fields(driver = %request.driver))]
	pub async fn open(&self, request: AdapterRequest) -> Result<Arc<dyn Adapter>, PolicyError> {
		let request = self.resolve(request)?;
		let driver = Driver::from_name(&request.driver).ok_or_else(|| PolicyError::UnsupportedDriver {
			driver: request.driver.clone(),
			supported: SUPPORTED_DRIVERS.iter().map(|d| d.to_string()).collect(),
		})?;

		let opening = loom_policy_adapters::open(driver, &request.connection, request.db_specified);
		let limit = deadline::remaining(self.io_timeout);
		let adapter = tokio::time::timeout(limit, opening)
			.await
			.map_err(|_| PolicyError::Timeout {
				operation: "open_adapter",
				timeout: limit,
			})??;

		info!(driver = driver.as_str(), "adapter opened");
		Ok(adapter)
	}
}
