// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and permission helpers over the `p` and `g` rule types.

use loom_policy_core::Section;
use tracing::instrument;

use super::management::{ROLE_INDEX, SUBJECT_INDEX};
use super::PolicyService;
use crate::error::PolicyError;
use crate::registry::Handle;

const POLICY: &str = "p";
const GROUPING: &str = "g";

fn grouping_rule(user: &str, role: &str, domain: Option<&str>) -> Vec<String> {
	let mut rule = vec![user.to_string(), role.to_string()];
	rule.extend(domain.map(str::to_string));
	rule
}

fn permission_rule(user: &str, permission: &[String]) -> Vec<String> {
	std::iter::once(user.to_string())
		.chain(permission.iter().cloned())
		.collect()
}

impl PolicyService {
	pub async fn domains_for_user(&self, handle: Handle, user: &str) -> Result<Vec<String>, PolicyError> {
		Ok(self.enforcer(handle)?.read().await.domains_for_user(user))
	}

	pub async fn roles_for_user(
		&self,
		handle: Handle,
		user: &str,
		domain: Option<&str>,
	) -> Result<Vec<String>, PolicyError> {
		Ok(self.enforcer(handle)?.read().await.roles_for_user(user, domain))
	}

	pub async fn implicit_roles_for_user(
		&self,
		handle: Handle,
		user: &str,
		domain: Option<&str>,
	) -> Result<Vec<String>, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.implicit_roles_for_user(user, domain))
	}

	pub async fn users_for_role(
		&self,
		handle: Handle,
		role: &str,
		domain: Option<&str>,
	) -> Result<Vec<String>, PolicyError> {
		Ok(self.enforcer(handle)?.read().await.users_for_role(role, domain))
	}

	pub async fn has_role_for_user(
		&self,
		handle: Handle,
		user: &str,
		role: &str,
		domain: Option<&str>,
	) -> Result<bool, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.has_role_for_user(user, role, domain))
	}

	/// Returns false when the user already had the role.
	#[instrument(skip(self))]
	pub async fn add_role_for_user(
		&self,
		handle: Handle,
		user: &str,
		role: &str,
		domain: Option<&str>,
	) -> Result<bool, PolicyError> {
		self.add_rule(handle, Section::Grouping, GROUPING, grouping_rule(user, role, domain))
			.await
	}

	#[instrument(skip(self))]
	pub async fn delete_role_for_user(
		&self,
		handle: Handle,
		user: &str,
		role: &str,
		domain: Option<&str>,
	) -> Result<bool, PolicyError> {
		self.remove_rule(handle, Section::Grouping, GROUPING, grouping_rule(user, role, domain))
			.await
	}

	/// Drops every role of `user`, within `domain` when one is given.
	#[instrument(skip(self))]
	pub async fn delete_roles_for_user(
		&self,
		handle: Handle,
		user: &str,
		domain: Option<&str>,
	) -> Result<bool, PolicyError> {
		// The role position is left open so any role in the domain matches.
		let filter = grouping_rule(user, "", domain);
		self.remove_filtered_rules(handle, Section::Grouping, GROUPING, SUBJECT_INDEX, filter)
			.await
	}

	/// Removes the user's role assignments. Permission rules are kept.
	#[instrument(skip(self))]
	pub async fn delete_user(&self, handle: Handle, user: &str) -> Result<bool, PolicyError> {
		self.remove_filtered_rules(
			handle,
			Section::Grouping,
			GROUPING,
			SUBJECT_INDEX,
			vec![user.to_string()],
		)
		.await
	}

	/// Removes every assignment of `role` and every permission granted to it.
	#[instrument(skip(self))]
	pub async fn delete_role(&self, handle: Handle, role: &str) -> Result<bool, PolicyError> {
		let unassigned = self
			.remove_filtered_rules(handle, Section::Grouping, GROUPING, ROLE_INDEX, vec![role.to_string()])
			.await?;
		let revoked = self
			.remove_filtered_rules(handle, Section::Policy, POLICY, SUBJECT_INDEX, vec![role.to_string()])
			.await?;
		Ok(unassigned || revoked)
	}

	/// Removes `permission` from every subject holding it.
	#[instrument(skip(self))]
	pub async fn delete_permission(&self, handle: Handle, permission: &[String]) -> Result<bool, PolicyError> {
		self.remove_filtered_rules(handle, Section::Policy, POLICY, SUBJECT_INDEX + 1, permission.to_vec())
			.await
	}

	#[instrument(skip(self))]
	pub async fn add_permission_for_user(
		&self,
		handle: Handle,
		user: &str,
		permission: &[String],
	) -> Result<bool, PolicyError> {
		self.add_rule(handle, Section::Policy, POLICY, permission_rule(user, permission))
			.await
	}

	#[instrument(skip(self))]
	pub async fn delete_permission_for_user(
		&self,
		handle: Handle,
		user: &str,
		permission: &[String],
	) -> Result<bool, PolicyError> {
		self.remove_rule(handle, Section::Policy, POLICY, permission_rule(user, permission))
			.await
	}

	#[instrument(skip(self))]
	pub async fn delete_permissions_for_user(&self, handle: Handle, user: &str) -> Result<bool, PolicyError> {
		self.remove_filtered_rules(handle, Section::Policy, POLICY, SUBJECT_INDEX, vec![user.to_string()])
			.await
	}

	pub async fn permissions_for_user(
		&self,
		handle: Handle,
		user: &str,
		domain: Option<&str>,
	) -> Result<Vec<Vec<String>>, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.permissions_for_user(user, domain))
	}

	pub async fn implicit_permissions_for_user(
		&self,
		handle: Handle,
		user: &str,
		domain: Option<&str>,
	) -> Result<Vec<Vec<String>>, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.implicit_permissions_for_user(user, domain))
	}

	pub async fn has_permission_for_user(
		&self,
		handle: Handle,
		user: &str,
		permission: &[String],
	) -> Result<bool, PolicyError> {
		Ok(self
			.enforcer(handle)?
			.read()
			.await
			.has_permission_for_user(user, permission))
	}
}
