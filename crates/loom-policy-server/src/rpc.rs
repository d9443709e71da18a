// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON request and reply shapes for the RPC surface, and method dispatch.
//!
//! Field names follow the wire names existing clients send (`enforcerHandler`,
//! `pType`, `fieldIndex`, ...). Missing fields take their zero value.

use loom_policy_core::Section;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::PolicyError;
use crate::factory::AdapterRequest;
use crate::registry::{Handle, NO_HANDLE};
use crate::service::management::{ACTION_INDEX, OBJECT_INDEX, ROLE_INDEX, SUBJECT_INDEX};
use crate::service::PolicyService;

fn no_handle() -> Handle {
	NO_HANDLE
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewAdapterRequest {
	pub adapter_name: String,
	pub driver_name: String,
	pub connect_string: String,
	pub db_specified: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnforcerRequest {
	#[serde(default)]
	pub model_text: String,
	#[serde(default = "no_handle")]
	pub adapter_handle: Handle,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnforceRequest {
	#[serde(alias = "handler")]
	pub enforcer_handler: Handle,
	pub params: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmptyRequest {
	#[serde(alias = "enforcerHandler")]
	pub handler: Handle,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyRequest {
	#[serde(alias = "handler")]
	pub enforcer_handler: Handle,
	pub p_type: String,
	pub params: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimpleGetRequest {
	#[serde(alias = "handler")]
	pub enforcer_handler: Handle,
	pub p_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilteredPolicyRequest {
	#[serde(alias = "handler")]
	pub enforcer_handler: Handle,
	pub p_type: String,
	pub field_index: i64,
	pub field_values: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRoleRequest {
	#[serde(alias = "handler")]
	pub enforcer_handler: Handle,
	pub user: String,
	pub role: String,
	pub domain: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PermissionRequest {
	#[serde(alias = "handler")]
	pub enforcer_handler: Handle,
	pub user: String,
	pub permissions: Vec<String>,
	pub domain: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Array2DRow {
	pub d1: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
	Handle { handler: Handle },
	Bool { res: bool },
	Array { array: Vec<String> },
	Array2D { d2: Vec<Array2DRow> },
	Empty {},
}

impl Reply {
	fn rows(rules: Vec<Vec<String>>) -> Self {
		Reply::Array2D {
			d2: rules.into_iter().map(|d1| Array2DRow { d1 }).collect(),
		}
	}
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T, PolicyError> {
	serde_json::from_value(body).map_err(|e| PolicyError::invalid_request(e.to_string()))
}

fn field_index(index: i64) -> Result<usize, PolicyError> {
	usize::try_from(index)
		.map_err(|_| PolicyError::invalid_request(format!("fieldIndex must not be negative, got {index}")))
}

fn first_domain(domain: &[String]) -> Option<&str> {
	domain.first().map(String::as_str).filter(|d| !d.is_empty())
}

/// Rule type for a `*Named*` method, or the section default otherwise.
fn ptype(named: bool, requested: &str, section: Section) -> &str {
	if named {
		requested
	} else {
		section.key()
	}
}

/// Executes one RPC by name.
#[instrument(skip(service, body))]
pub async fn dispatch(service: &PolicyService, method: &str, body: Value) -> Result<Reply, PolicyError> {
	use Section::{Grouping, Policy};

	let reply = match method {
		"NewAdapter" => {
			let req: NewAdapterRequest = parse(body)?;
			debug!(adapter_name = %req.adapter_name, driver = %req.driver_name, "opening adapter");
			let handle = service
				.new_adapter(AdapterRequest {
					driver: req.driver_name,
					connection: req.connect_string,
					db_specified: req.db_specified,
				})
				.await?;
			Reply::Handle { handler: handle }
		}
		"NewEnforcer" => {
			let req: NewEnforcerRequest = parse(body)?;
			let handle = service.new_enforcer(&req.model_text, req.adapter_handle).await?;
			Reply::Handle { handler: handle }
		}
		"Enforce" => {
			let req: EnforceRequest = parse(body)?;
			Reply::Bool {
				res: service.enforce(req.enforcer_handler, &req.params).await?,
			}
		}
		"LoadPolicy" => {
			let req: EmptyRequest = parse(body)?;
			service.load_policy(req.handler).await?;
			Reply::Empty {}
		}
		"SavePolicy" => {
			let req: EmptyRequest = parse(body)?;
			service.save_policy(req.handler).await?;
			Reply::Empty {}
		}

		"AddPolicy" | "AddNamedPolicy" | "AddGroupingPolicy" | "AddNamedGroupingPolicy" => {
			let req: PolicyRequest = parse(body)?;
			let section = if method.contains("Grouping") { Grouping } else { Policy };
			let ptype = ptype(method.contains("Named"), &req.p_type, section);
			Reply::Bool {
				res: service
					.add_rule(req.enforcer_handler, section, ptype, req.params)
					.await?,
			}
		}
		"RemovePolicy" | "RemoveNamedPolicy" | "RemoveGroupingPolicy" | "RemoveNamedGroupingPolicy" => {
			let req: PolicyRequest = parse(body)?;
			let section = if method.contains("Grouping") { Grouping } else { Policy };
			let ptype = ptype(method.contains("Named"), &req.p_type, section);
			Reply::Bool {
				res: service
					.remove_rule(req.enforcer_handler, section, ptype, req.params)
					.await?,
			}
		}
		"RemoveFilteredPolicy"
		| "RemoveFilteredNamedPolicy"
		| "RemoveFilteredGroupingPolicy"
		| "RemoveFilteredNamedGroupingPolicy" => {
			let req: FilteredPolicyRequest = parse(body)?;
			let section = if method.contains("Grouping") { Grouping } else { Policy };
			let ptype = ptype(method.contains("Named"), &req.p_type, section);
			Reply::Bool {
				res: service
					.remove_filtered_rules(
						req.enforcer_handler,
						section,
						ptype,
						field_index(req.field_index)?,
						req.field_values,
					)
					.await?,
			}
		}

		"GetPolicy" | "GetGroupingPolicy" => {
			let req: EmptyRequest = parse(body)?;
			let section = if method == "GetGroupingPolicy" { Grouping } else { Policy };
			Reply::rows(service.rules(req.handler, section, section.key()).await?)
		}
		"GetNamedPolicy" | "GetNamedGroupingPolicy" => {
			let req: PolicyRequest = parse(body)?;
			let section = if method == "GetNamedGroupingPolicy" { Grouping } else { Policy };
			Reply::rows(service.rules(req.enforcer_handler, section, &req.p_type).await?)
		}
		"GetFilteredPolicy"
		| "GetFilteredNamedPolicy"
		| "GetFilteredGroupingPolicy"
		| "GetFilteredNamedGroupingPolicy" => {
			let req: FilteredPolicyRequest = parse(body)?;
			let section = if method.contains("Grouping") { Grouping } else { Policy };
			let ptype = ptype(method.contains("Named"), &req.p_type, section);
			Reply::rows(
				service
					.filtered_rules(
						req.enforcer_handler,
						section,
						ptype,
						field_index(req.field_index)?,
						&req.field_values,
					)
					.await?,
			)
		}
		"GetAllSubjects" | "GetAllObjects" | "GetAllActions" | "GetAllRoles" => {
			let req: EmptyRequest = parse(body)?;
			let (section, index) = value_field(method);
			Reply::Array {
				array: service
					.field_values(req.handler, section, section.key(), index)
					.await?,
			}
		}
		"GetAllNamedSubjects" | "GetAllNamedObjects" | "GetAllNamedActions" | "GetAllNamedRoles" => {
			let req: SimpleGetRequest = parse(body)?;
			let (section, index) = value_field(method);
			Reply::Array {
				array: service
					.field_values(req.enforcer_handler, section, &req.p_type, index)
					.await?,
			}
		}
		"HasPolicy" | "HasNamedPolicy" | "HasGroupingPolicy" | "HasNamedGroupingPolicy" => {
			let req: PolicyRequest = parse(body)?;
			let section = if method.contains("Grouping") { Grouping } else { Policy };
			let ptype = ptype(method.contains("Named"), &req.p_type, section);
			Reply::Bool {
				res: service
					.has_rule(req.enforcer_handler, section, ptype, &req.params)
					.await?,
			}
		}

		"GetDomains" | "GetRolesForUser" | "GetImplicitRolesForUser" | "GetUsersForRole" => {
			let req: UserRoleRequest = parse(body)?;
			let (h, domain) = (req.enforcer_handler, first_domain(&req.domain));
			let array = match method {
				"GetDomains" => service.domains_for_user(h, &req.user).await?,
				"GetRolesForUser" => service.roles_for_user(h, &req.user, domain).await?,
				"GetImplicitRolesForUser" => service.implicit_roles_for_user(h, &req.user, domain).await?,
				_ => service.users_for_role(h, &req.role, domain).await?,
			};
			Reply::Array { array }
		}
		"HasRoleForUser" | "AddRoleForUser" | "DeleteRoleForUser" | "DeleteRolesForUser" | "DeleteUser" => {
			let req: UserRoleRequest = parse(body)?;
			let (h, domain) = (req.enforcer_handler, first_domain(&req.domain));
			let res = match method {
				"HasRoleForUser" => service.has_role_for_user(h, &req.user, &req.role, domain).await?,
				"AddRoleForUser" => service.add_role_for_user(h, &req.user, &req.role, domain).await?,
				"DeleteRoleForUser" => service.delete_role_for_user(h, &req.user, &req.role, domain).await?,
				"DeleteRolesForUser" => service.delete_roles_for_user(h, &req.user, domain).await?,
				_ => service.delete_user(h, &req.user).await?,
			};
			Reply::Bool { res }
		}
		"DeleteRole" => {
			let req: UserRoleRequest = parse(body)?;
			service.delete_role(req.enforcer_handler, &req.role).await?;
			Reply::Empty {}
		}
		"DeletePermission"
		| "AddPermissionForUser"
		| "DeletePermissionForUser"
		| "DeletePermissionsForUser"
		| "HasPermissionForUser" => {
			let req: PermissionRequest = parse(body)?;
			let h = req.enforcer_handler;
			let res = match method {
				"DeletePermission" => service.delete_permission(h, &req.permissions).await?,
				"AddPermissionForUser" => service.add_permission_for_user(h, &req.user, &req.permissions).await?,
				"DeletePermissionForUser" => {
					service
						.delete_permission_for_user(h, &req.user, &req.permissions)
						.await?
				}
				"DeletePermissionsForUser" => service.delete_permissions_for_user(h, &req.user).await?,
				_ => service.has_permission_for_user(h, &req.user, &req.permissions).await?,
			};
			Reply::Bool { res }
		}
		"GetPermissionsForUser" | "GetImplicitPermissionsForUser" => {
			let req: PermissionRequest = parse(body)?;
			let (h, domain) = (req.enforcer_handler, first_domain(&req.domain));
			let rules = if method == "GetPermissionsForUser" {
				service.permissions_for_user(h, &req.user, domain).await?
			} else {
				service.implicit_permissions_for_user(h, &req.user, domain).await?
			};
			Reply::rows(rules)
		}

		other => return Err(PolicyError::UnknownMethod(other.to_string())),
	};
	Ok(reply)
}

fn value_field(method: &str) -> (Section, usize) {
	if method.ends_with("Subjects") {
		(Section::Policy, SUBJECT_INDEX)
	} else if method.ends_with("Objects") {
		(Section::Policy, OBJECT_INDEX)
	} else if method.ends_with("Actions") {
		(Section::Policy, ACTION_INDEX)
	} else {
		(Section::Grouping, ROLE_INDEX)
	}
}
