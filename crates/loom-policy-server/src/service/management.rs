// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule management and introspection, addressed by section and rule type.

use loom_policy_core::Section;
use tracing::instrument;

use super::PolicyService;
use crate::error::PolicyError;
use crate::registry::Handle;

/// Field positions in a `p` rule.
pub const SUBJECT_INDEX: usize = 0;
pub const OBJECT_INDEX: usize = 1;
pub const ACTION_INDEX: usize = 2;
/// Field position of the role in a `g` rule.
pub const ROLE_INDEX: usize = 1;

impl PolicyService {
	#[instrument(skip(self, rule))]
	pub async fn add_rule(
		&self,
		handle: Handle,
		section: Section,
		ptype: &str,
		rule: Vec<String>,
	) -> Result<bool, PolicyError> {
		self.enforcer(handle)?.add_rules(section, ptype, vec![rule]).await
	}

	#[instrument(skip(self, rule))]
	pub async fn remove_rule(
		&self,
		handle: Handle,
		section: Section,
		ptype: &str,
		rule: Vec<String>,
	) -> Result<bool, PolicyError> {
		self.enforcer(handle)?.remove_rules(section, ptype, vec![rule]).await
	}

	#[instrument(skip(self, field_values))]
	pub async fn remove_filtered_rules(
		&self,
		handle: Handle,
		section: Section,
		ptype: &str,
		field_index: usize,
		field_values: Vec<String>,
	) -> Result<bool, PolicyError> {
		self.enforcer(handle)?
			.remove_filtered_rules(section, ptype, field_index, field_values)
			.await
	}

	pub async fn rules(&self, handle: Handle, section: Section, ptype: &str) -> Result<Vec<Vec<String>>, PolicyError> {
		Ok(self.enforcer(handle)?.read().await.rules(section, ptype)?)
	}

	pub async fn filtered_rules(
		&self,
		handle: Handle,
		section: Section,
		ptype: &str,
		field_index: usize,
		field_values: &[String],
	) -> Result<Vec<Vec<String>>, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.filtered_rules(section, ptype, field_index, field_values)?)
	}

	pub async fn has_rule(
		&self,
		handle: Handle,
		section: Section,
		ptype: &str,
		rule: &[String],
	) -> Result<bool, PolicyError> {
		Ok(self.enforcer(handle)?.read().await.has_rule(section, ptype, rule))
	}

	/// Distinct values at `field_index` across the rules of `ptype`.
	pub async fn field_values(
		&self,
		handle: Handle,
		section: Section,
		ptype: &str,
		field_index: usize,
	) -> Result<Vec<String>, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.values_for_field(section, ptype, field_index))
	}
}

#[cfg(test)]
mod tests {
	use super::super::test_support::*;
	use super::*;
	use crate::registry::NO_HANDLE;

	async fn seeded() -> (PolicyService, Handle) {
		let svc = service("/unused.json");
		let handle = svc.new_enforcer(RBAC_MODEL, NO_HANDLE).await.unwrap();
		for rule in [["alice", "data1", "read"], ["bob", "data2", "write"], ["admin", "data2", "read"]] {
			assert!(svc
				.add_rule(handle, Section::Policy, "p", strings(&rule))
				.await
				.unwrap());
		}
		svc.add_rule(handle, Section::Grouping, "g", strings(&["carol", "admin"]))
			.await
			.unwrap();
		(svc, handle)
	}

	#[tokio::test]
	async fn duplicate_add_reports_no_change() {
		let (svc, handle) = seeded().await;
		let again = svc
			.add_rule(handle, Section::Policy, "p", strings(&["alice", "data1", "read"]))
			.await
			.unwrap();
		assert!(!again);
		assert_eq!(svc.rules(handle, Section::Policy, "p").await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn field_values_are_distinct() {
		let (svc, handle) = seeded().await;
		assert_eq!(
			svc.field_values(handle, Section::Policy, "p", SUBJECT_INDEX).await.unwrap(),
			strings(&["alice", "bob", "admin"])
		);
		assert_eq!(
			svc.field_values(handle, Section::Policy, "p", OBJECT_INDEX).await.unwrap(),
			strings(&["data1", "data2"])
		);
		assert_eq!(
			svc.field_values(handle, Section::Grouping, "g", ROLE_INDEX).await.unwrap(),
			strings(&["admin"])
		);
	}

	#[tokio::test]
	async fn filtered_queries_and_removal() {
		let (svc, handle) = seeded().await;
		let data2 = svc
			.filtered_rules(handle, Section::Policy, "p", OBJECT_INDEX, &strings(&["data2"]))
			.await
			.unwrap();
		assert_eq!(data2.len(), 2);

		assert!(svc
			.remove_filtered_rules(handle, Section::Policy, "p", OBJECT_INDEX, strings(&["data2", "read"]))
			.await
			.unwrap());
		assert!(!svc
			.has_rule(handle, Section::Policy, "p", &strings(&["admin", "data2", "read"]))
			.await
			.unwrap());
		assert!(svc
			.has_rule(handle, Section::Policy, "p", &strings(&["bob", "data2", "write"]))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn grouping_changes_affect_decisions() {
		let (svc, handle) = seeded().await;
		let request = strings(&["carol", "data2", "read"]);
		assert!(svc.enforce(handle, &request).await.unwrap());

		assert!(svc
			.remove_rule(handle, Section::Grouping, "g", strings(&["carol", "admin"]))
			.await
			.unwrap());
		assert!(!svc.enforce(handle, &request).await.unwrap());
	}

	#[tokio::test]
	async fn undeclared_rule_type_is_an_error() {
		let (svc, handle) = seeded().await;
		let result = svc.rules(handle, Section::Grouping, "g2").await;
		assert!(matches!(result, Err(PolicyError::Evaluation(_))));
	}
}
