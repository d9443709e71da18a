// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The policy service: lifecycle, decisions and persistence.
//!
//! Rule management lives in [`management`], role and permission helpers in [`rbac`].

pub mod management;
pub mod rbac;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use loom_policy_config::{ConfigError, ServerConfig};
use loom_policy_core::{Adapter, Enforcer};
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use crate::abac::AbacResolver;
use crate::error::PolicyError;
use crate::factory::{AdapterFactory, AdapterRequest};
use crate::instance::EnforcerInstance;
use crate::pipeline::EnforcementPipeline;
use crate::registry::{Handle, HandleRegistry, NO_HANDLE};

pub struct PolicyService {
	registry: Arc<HandleRegistry>,
	factory: AdapterFactory,
	pipeline: EnforcementPipeline,
	io_timeout: Duration,
	default_enforcer: OnceCell<Handle>,
}

impl PolicyService {
	pub fn new(config: &ServerConfig) -> Self {
		Self::with_parts(
			Arc::new(HandleRegistry::new()),
			AdapterFactory::new(&config.policy.connection_config_path, config.policy.io_timeout),
			AbacResolver::new(config.abac.slot_width),
			config.policy.io_timeout,
		)
	}

	pub fn with_parts(
		registry: Arc<HandleRegistry>,
		factory: AdapterFactory,
		resolver: AbacResolver,
		io_timeout: Duration,
	) -> Self {
		Self {
			pipeline: EnforcementPipeline::new(Arc::clone(&registry), resolver),
			registry,
			factory,
			io_timeout,
			default_enforcer: OnceCell::new(),
		}
	}

	pub fn registry(&self) -> &Arc<HandleRegistry> {
		&self.registry
	}

	pub(crate) fn enforcer(&self, handle: Handle) -> Result<Arc<EnforcerInstance>, PolicyError> {
		self.registry.enforcer(handle)
	}

	/// Opens an adapter and registers it. Empty driver or connection fields are
	/// taken from the fallback connection file.
	#[instrument(skip(self, request), fields(driver = %request.driver))]
	pub async fn new_adapter(&self, request: AdapterRequest) -> Result<Handle, PolicyError> {
		let adapter = self.factory.open(request).await?;
		Ok(self.registry.register_adapter(adapter))
	}

	/// Builds an enforcer and registers it.
	///
	/// An empty `model_text` reads the model file named by the fallback
	/// connection file. With an adapter, its policy is loaded before the handle
	/// is issued.
	#[instrument(skip(self, model_text), fields(inline_model = !model_text.is_empty()))]
	pub async fn new_enforcer(&self, model_text: &str, adapter_handle: Handle) -> Result<Handle, PolicyError> {
		let adapter: Option<Arc<dyn Adapter>> = match adapter_handle {
			NO_HANDLE => None,
			handle => Some(self.registry.adapter(handle)?),
		};

		let enforcer = if model_text.is_empty() {
			let path = self.factory.fallback()?.enforcer;
			Enforcer::from_model_text(&read_model_file(Path::new(&path)).await?)?
		} else {
			Enforcer::from_model_text(model_text)?
		};

		let instance = Arc::new(EnforcerInstance::new(enforcer, adapter, self.io_timeout));
		if instance.adapter().is_some() {
			instance.load_policy().await?;
		}
		Ok(self.registry.register_enforcer(instance))
	}

	/// Adapter and enforcer both built from the fallback connection file.
	pub async fn init_default_enforcer(&self) -> Result<Handle, PolicyError> {
		let adapter = self.new_adapter(AdapterRequest::default()).await?;
		let handle = self.new_enforcer("", adapter).await?;
		info!(handle, adapter, "default enforcer initialised");
		Ok(handle)
	}

	/// The adapter-less enforcer used when a side-channel caller passes `-1`.
	/// Created on first use and reused afterwards. Unlike a per-call enforcer,
	/// repeated `-1` requests share this one instance and never grow the registry.
	pub async fn default_enforcer_handle(&self) -> Result<Handle, PolicyError> {
		self.default_enforcer
			.get_or_try_init(|| self.new_enforcer("", NO_HANDLE))
			.await
			.copied()
	}

	pub async fn enforce(&self, handle: Handle, params: &[String]) -> Result<bool, PolicyError> {
		self.pipeline.decide(handle, params).await
	}

	pub async fn load_policy(&self, handle: Handle) -> Result<(), PolicyError> {
		self.enforcer(handle)?.load_policy().await
	}

	pub async fn save_policy(&self, handle: Handle) -> Result<(), PolicyError> {
		self.enforcer(handle)?.save_policy().await
	}
}

async fn read_model_file(path: &Path) -> Result<String, PolicyError> {
	tokio::fs::read_to_string(path).await.map_err(|source| {
		PolicyError::ConfigLoad(ConfigError::FileRead {
			path: path.to_path_buf(),
			source,
		})
	})
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;

	pub const RBAC_MODEL: &str = "
[request_definition]
r = sub, obj, act
[policy_definition]
p = sub, obj, act
[role_definition]
g = _, _
[policy_effect]
e = some(where (p.eft == allow))
[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
";

	pub fn service(connection_config: impl AsRef<Path>) -> PolicyService {
		PolicyService::with_parts(
			Arc::new(HandleRegistry::new()),
			AdapterFactory::new(connection_config.as_ref(), Duration::from_secs(5)),
			AbacResolver::default(),
			Duration::from_secs(5),
		)
	}

	pub fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|s| s.to_string()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;
	use crate::error::HandleKind;

	fn file_request(path: &Path) -> AdapterRequest {
		AdapterRequest {
			driver: "file".to_string(),
			connection: path.display().to_string(),
			db_specified: false,
		}
	}

	#[tokio::test]
	async fn enforcer_with_file_adapter_loads_its_policy() {
		let dir = tempfile::tempdir().unwrap();
		let policy = dir.path().join("policy.csv");
		std::fs::write(&policy, "p, admin, data1, read\ng, alice, admin\n").unwrap();

		let svc = service(dir.path().join("unused.json"));
		let adapter = svc.new_adapter(file_request(&policy)).await.unwrap();
		let handle = svc.new_enforcer(RBAC_MODEL, adapter).await.unwrap();

		assert!(svc.enforce(handle, &strings(&["alice", "data1", "read"])).await.unwrap());
		assert!(!svc.enforce(handle, &strings(&["alice", "data2", "read"])).await.unwrap());
	}

	#[tokio::test]
	async fn failed_policy_load_registers_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let svc = service(dir.path().join("unused.json"));
		let adapter = svc
			.new_adapter(file_request(&dir.path().join("missing.csv")))
			.await
			.unwrap();

		let result = svc.new_enforcer(RBAC_MODEL, adapter).await;
		assert!(matches!(result, Err(PolicyError::Adapter(_))));
		assert_eq!(svc.registry().enforcer_count(), 0);
	}

	#[tokio::test]
	async fn unknown_adapter_handle_is_not_found() {
		let svc = service("/unused.json");
		let result = svc.new_enforcer(RBAC_MODEL, 5).await;
		assert!(matches!(
			result,
			Err(PolicyError::NotFound {
				kind: HandleKind::Adapter,
				handle: 5
			})
		));
	}

	#[tokio::test]
	async fn empty_model_text_reads_the_configured_model_file() {
		let dir = tempfile::tempdir().unwrap();
		let model = dir.path().join("model.conf");
		std::fs::write(&model, RBAC_MODEL).unwrap();
		let connection = dir.path().join("connection_config.json");
		std::fs::write(
			&connection,
			format!(
				r#"{{"driver": "file", "connection": "{}", "enforcer": "{}"}}"#,
				dir.path().join("policy.csv").display(),
				model.display()
			),
		)
		.unwrap();
		std::fs::write(dir.path().join("policy.csv"), "p, bob, data2, write\n").unwrap();

		let svc = service(&connection);
		let handle = svc.init_default_enforcer().await.unwrap();
		assert!(svc.enforce(handle, &strings(&["bob", "data2", "write"])).await.unwrap());

		let first = svc.default_enforcer_handle().await.unwrap();
		let second = svc.default_enforcer_handle().await.unwrap();
		assert_eq!(first, second);
		assert_ne!(first, handle);
	}

	#[tokio::test]
	async fn missing_connection_file_surfaces_on_first_use() {
		let svc = service("/nonexistent/connection_config.json");
		let result = svc.new_enforcer("", NO_HANDLE).await;
		assert!(matches!(result, Err(PolicyError::ConfigLoad(_))));
	}

	#[tokio::test]
	async fn invalid_model_text_is_rejected() {
		let svc = service("/unused.json");
		let result = svc.new_enforcer("[request_definition]\nr = sub\n", NO_HANDLE).await;
		assert!(matches!(result, Err(PolicyError::Model(_))));
	}
}
