// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A registered enforcer together with its adapter and locks.
//!
//! Decisions and queries take the read lock. Mutations, loads and saves are
//! serialised per instance by `gate`; adapter I/O happens under the gate only,
//! and the model is then updated under a short write lock. Adapter calls are
//! bounded by the I/O timeout or the caller's deadline, see [`crate::deadline`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use loom_policy_core::{Adapter, AdapterError, Enforcer, EvalError, Section};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, instrument};

use crate::deadline;
use crate::error::PolicyError;

pub struct EnforcerInstance {
	enforcer: RwLock<Enforcer>,
	gate: Mutex<()>,
	adapter: Option<Arc<dyn Adapter>>,
	io_timeout: Duration,
}

impl EnforcerInstance {
	pub fn new(enforcer: Enforcer, adapter: Option<Arc<dyn Adapter>>, io_timeout: Duration) -> Self {
		Self {
			enforcer: RwLock::new(enforcer),
			gate: Mutex::new(()),
			adapter,
			io_timeout,
		}
	}

	pub async fn read(&self) -> RwLockReadGuard<'_, Enforcer> {
		self.enforcer.read().await
	}

	pub fn adapter(&self) -> Option<&Arc<dyn Adapter>> {
		self.adapter.as_ref()
	}

	async fn bounded<T>(
		&self,
		operation: &'static str,
		fut: impl Future<Output = Result<T, AdapterError>>,
	) -> Result<T, PolicyError> {
		let limit = deadline::remaining(self.io_timeout);
		match tokio::time::timeout(limit, fut).await {
			Ok(result) => result.map_err(PolicyError::from),
			Err(_) => Err(PolicyError::Timeout {
				operation,
				timeout: limit,
			}),
		}
	}

	/// Runs an incremental adapter write. Adapters without incremental support
	/// leave the in-memory change to be persisted by the next save.
	async fn persist_incremental(
		&self,
		operation: &'static str,
		fut: impl Future<Output = Result<(), AdapterError>>,
	) -> Result<(), PolicyError> {
		match self.bounded(operation, fut).await {
			Err(PolicyError::Adapter(AdapterError::NotImplemented)) => {
				debug!(operation, "adapter has no incremental support");
				Ok(())
			}
			other => other,
		}
	}

	fn require_adapter(&self) -> Result<&Arc<dyn Adapter>, PolicyError> {
		self.adapter
			.as_ref()
			.ok_or_else(|| PolicyError::invalid_request("enforcer has no adapter"))
	}

	/// Replaces the in-memory rules with the adapter's contents.
	#[instrument(skip(self))]
	pub async fn load_policy(&self) -> Result<(), PolicyError> {
		let adapter = self.require_adapter()?;
		let _gate = self.gate.lock().await;
		let lines = self.bounded("load_policy", adapter.load_policy()).await?;
		let count = lines.len();
		self.enforcer.write().await.replace_rules(lines);
		debug!(count, "policy loaded");
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn save_policy(&self) -> Result<(), PolicyError> {
		let adapter = self.require_adapter()?;
		let _gate = self.gate.lock().await;
		let lines = self.enforcer.read().await.policy_lines();
		self.bounded("save_policy", adapter.save_policy(&lines)).await?;
		debug!(count = lines.len(), "policy saved");
		Ok(())
	}

	/// Adds the rules not already present. Returns whether anything changed.
	pub async fn add_rules(
		&self,
		section: Section,
		ptype: &str,
		rules: Vec<Vec<String>>,
	) -> Result<bool, PolicyError> {
		let _gate = self.gate.lock().await;
		let fresh: Vec<Vec<String>> = {
			let enforcer = self.enforcer.read().await;
			ensure_ptype(&enforcer, section, ptype)?;
			let mut fresh: Vec<Vec<String>> = Vec::new();
			for rule in rules {
				if !enforcer.has_rule(section, ptype, &rule) && !fresh.contains(&rule) {
					fresh.push(rule);
				}
			}
			fresh
		};
		if fresh.is_empty() {
			return Ok(false);
		}

		if let Some(adapter) = &self.adapter {
			self.persist_incremental("add_policies", adapter.add_policies(ptype, &fresh))
				.await?;
		}
		let added = self.enforcer.write().await.add_rules(section, ptype, fresh)?;
		Ok(!added.is_empty())
	}

	/// Removes the rules that are present. Returns whether anything changed.
	pub async fn remove_rules(
		&self,
		section: Section,
		ptype: &str,
		rules: Vec<Vec<String>>,
	) -> Result<bool, PolicyError> {
		let _gate = self.gate.lock().await;
		let present: Vec<Vec<String>> = {
			let enforcer = self.enforcer.read().await;
			ensure_ptype(&enforcer, section, ptype)?;
			rules
				.into_iter()
				.filter(|rule| enforcer.has_rule(section, ptype, rule))
				.collect()
		};
		if present.is_empty() {
			return Ok(false);
		}

		if let Some(adapter) = &self.adapter {
			self.persist_incremental("remove_policies", adapter.remove_policies(ptype, &present))
				.await?;
		}
		let removed = self
			.enforcer
			.write()
			.await
			.remove_rules(section, ptype, &present)?;
		Ok(!removed.is_empty())
	}

	/// Removes every rule matching `field_values` from `field_index` on.
	pub async fn remove_filtered_rules(
		&self,
		section: Section,
		ptype: &str,
		field_index: usize,
		field_values: Vec<String>,
	) -> Result<bool, PolicyError> {
		let _gate = self.gate.lock().await;
		let matched = self
			.enforcer
			.read()
			.await
			.filtered_rules(section, ptype, field_index, &field_values)?;
		if matched.is_empty() {
			return Ok(false);
		}

		if let Some(adapter) = &self.adapter {
			self.persist_incremental(
				"remove_filtered_policy",
				adapter.remove_filtered_policy(ptype, field_index, &field_values),
			)
			.await?;
		}
		let removed = self.enforcer.write().await.remove_filtered_rules(
			section,
			ptype,
			field_index,
			&field_values,
		)?;
		Ok(!removed.is_empty())
	}
}

fn ensure_ptype(enforcer: &Enforcer, section: Section, ptype: &str) -> Result<(), EvalError> {
	match enforcer.model().assertion(section, ptype) {
		Some(_) => Ok(()),
		None => Err(EvalError::MissingPolicyDefinition(ptype.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use loom_policy_core::PolicyLine;
	use std::sync::Mutex as StdMutex;

	const MODEL: &str = "
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

	#[derive(Default)]
	struct MemoryAdapter {
		lines: StdMutex<Vec<PolicyLine>>,
		added: StdMutex<Vec<Vec<String>>>,
	}

	#[async_trait]
	impl Adapter for MemoryAdapter {
		fn driver(&self) -> &str {
			"memory"
		}

		async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
			Ok(self.lines.lock().unwrap().clone())
		}

		async fn save_policy(&self, lines: &[PolicyLine]) -> Result<(), AdapterError> {
			*self.lines.lock().unwrap() = lines.to_vec();
			Ok(())
		}

		async fn add_policies(&self, _ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
			self.added.lock().unwrap().extend(rules.iter().cloned());
			Ok(())
		}
	}

	struct SlowAdapter;

	#[async_trait]
	impl Adapter for SlowAdapter {
		fn driver(&self) -> &str {
			"slow"
		}

		async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(Vec::new())
		}

		async fn save_policy(&self, _lines: &[PolicyLine]) -> Result<(), AdapterError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}

		async fn add_policies(&self, _ptype: &str, _rules: &[Vec<String>]) -> Result<(), AdapterError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}
	}

	fn rule(fields: &[&str]) -> Vec<String> {
		fields.iter().map(|s| s.to_string()).collect()
	}

	fn instance(adapter: Option<Arc<dyn Adapter>>) -> EnforcerInstance {
		let enforcer = Enforcer::from_model_text(MODEL).unwrap();
		EnforcerInstance::new(enforcer, adapter, Duration::from_millis(200))
	}

	#[tokio::test]
	async fn add_reports_only_new_rules_to_the_adapter() {
		let adapter = Arc::new(MemoryAdapter::default());
		let instance = instance(Some(adapter.clone()));

		let changed = instance
			.add_rules(Section::Policy, "p", vec![rule(&["alice", "data1", "read"])])
			.await
			.unwrap();
		assert!(changed);

		let changed = instance
			.add_rules(
				Section::Policy,
				"p",
				vec![rule(&["alice", "data1", "read"]), rule(&["bob", "data2", "write"])],
			)
			.await
			.unwrap();
		assert!(changed);
		assert_eq!(
			*adapter.added.lock().unwrap(),
			vec![rule(&["alice", "data1", "read"]), rule(&["bob", "data2", "write"])]
		);
	}

	#[tokio::test]
	async fn missing_incremental_support_keeps_the_in_memory_change() {
		struct Plain;

		#[async_trait]
		impl Adapter for Plain {
			fn driver(&self) -> &str {
				"plain"
			}
			async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
				Ok(Vec::new())
			}
			async fn save_policy(&self, _lines: &[PolicyLine]) -> Result<(), AdapterError> {
				Ok(())
			}
		}

		let instance = instance(Some(Arc::new(Plain)));
		instance
			.add_rules(Section::Grouping, "g", vec![rule(&["alice", "admin"])])
			.await
			.unwrap();
		assert!(instance.read().await.has_role_for_user("alice", "admin", None));

		let changed = instance
			.remove_rules(Section::Grouping, "g", vec![rule(&["alice", "admin"])])
			.await
			.unwrap();
		assert!(changed);
		assert!(!instance.read().await.has_role_for_user("alice", "admin", None));
	}

	#[tokio::test]
	async fn save_then_load_round_trips_through_the_adapter() {
		let adapter = Arc::new(MemoryAdapter::default());
		let first = instance(Some(adapter.clone()));
		first
			.add_rules(Section::Policy, "p", vec![rule(&["admin", "data1", "read"])])
			.await
			.unwrap();
		first
			.add_rules(Section::Grouping, "g", vec![rule(&["alice", "admin"])])
			.await
			.unwrap();
		first.save_policy().await.unwrap();

		let second = instance(Some(adapter));
		second.load_policy().await.unwrap();
		let enforcer = second.read().await;
		assert!(enforcer
			.enforce(&["alice".into(), "data1".into(), "read".into()])
			.unwrap());
	}

	#[tokio::test]
	async fn load_without_adapter_is_rejected() {
		let result = instance(None).load_policy().await;
		assert!(matches!(result, Err(PolicyError::InvalidRequest(_))));
	}

	#[tokio::test]
	async fn slow_adapter_times_out() {
		let result = instance(Some(Arc::new(SlowAdapter))).load_policy().await;
		assert!(matches!(
			result,
			Err(PolicyError::Timeout {
				operation: "load_policy",
				..
			})
		));
	}

	#[tokio::test]
	async fn caller_deadline_cuts_load_short() {
		let enforcer = Enforcer::from_model_text(MODEL).unwrap();
		let instance =
			EnforcerInstance::new(enforcer, Some(Arc::new(SlowAdapter)), Duration::from_secs(30));
		let started = std::time::Instant::now();
		let result = deadline::scope(Some(Duration::from_millis(50)), instance.load_policy()).await;
		match result {
			Err(PolicyError::Timeout { operation, timeout }) => {
				assert_eq!(operation, "load_policy");
				assert!(timeout <= Duration::from_millis(50));
			}
			other => panic!("expected timeout, got {other:?}"),
		}
		assert!(started.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn caller_deadline_bounds_writes() {
		let enforcer = Enforcer::from_model_text(MODEL).unwrap();
		let instance =
			EnforcerInstance::new(enforcer, Some(Arc::new(SlowAdapter)), Duration::from_secs(30));

		let result = deadline::scope(
			Some(Duration::from_millis(50)),
			instance.add_rules(Section::Policy, "p", vec![rule(&["alice", "data1", "read"])]),
		)
		.await;
		assert!(matches!(
			result,
			Err(PolicyError::Timeout {
				operation: "add_policies",
				..
			})
		));
		assert!(!instance
			.read()
			.await
			.has_rule(Section::Policy, "p", &rule(&["alice", "data1", "read"])));

		let result = deadline::scope(Some(Duration::from_millis(50)), instance.save_policy()).await;
		assert!(matches!(
			result,
			Err(PolicyError::Timeout {
				operation: "save_policy",
				..
			})
		));
	}

	#[tokio::test]
	async fn unknown_ptype_is_an_evaluation_error() {
		let result = instance(None)
			.add_rules(Section::Policy, "p9", vec![rule(&["a", "b", "c"])])
			.await;
		assert!(matches!(
			result,
			Err(PolicyError::Evaluation(EvalError::MissingPolicyDefinition(_)))
		));
	}

	#[tokio::test]
	async fn filtered_removal_reports_change() {
		let instance = instance(None);
		instance
			.add_rules(
				Section::Policy,
				"p",
				vec![rule(&["alice", "data1", "read"]), rule(&["alice", "data2", "write"])],
			)
			.await
			.unwrap();
		assert!(instance
			.remove_filtered_rules(Section::Policy, "p", 0, vec!["alice".to_string()])
			.await
			.unwrap());
		assert!(!instance
			.remove_filtered_rules(Section::Policy, "p", 0, vec!["alice".to_string()])
			.await
			.unwrap());
		assert!(instance.read().await.rules(Section::Policy, "p").unwrap().is_empty());
	}
}
