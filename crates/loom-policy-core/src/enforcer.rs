// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The in-memory enforcer: a model, its rules, and derived role graphs.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::adapter::PolicyLine;
use crate::effect::RuleEffect;
use crate::error::{EvalError, ModelError, Result};
use crate::matcher::{self, Scope};
use crate::model::{Model, Section};
use crate::rbac::RoleManager;
use crate::value::RequestValue;

const DEFAULT_POLICY_TYPE: &str = "p";
const DEFAULT_GROUPING_TYPE: &str = "g";

/// Evaluates requests against a [`Model`] and owns its rule store.
#[derive(Debug, Clone)]
pub struct Enforcer {
	model: Model,
	role_managers: BTreeMap<String, RoleManager>,
}

impl Enforcer {
	pub fn new(model: Model) -> Self {
		let mut enforcer = Self {
			model,
			role_managers: BTreeMap::new(),
		};
		enforcer.rebuild_role_managers();
		enforcer
	}

	pub fn from_model_text(text: &str) -> Result<Self, ModelError> {
		Model::from_text(text).map(Self::new)
	}

	pub fn model(&self) -> &Model {
		&self.model
	}

	/// The matcher expression as loaded from the model.
	pub fn matcher(&self) -> &str {
		self.model.matcher()
	}

	pub fn enforce(&self, request: &[RequestValue]) -> Result<bool> {
		self.enforce_with_matcher(self.model.matcher(), request)
	}

	/// Evaluates `request` using `matcher` in place of the model's matcher.
	///
	/// The model itself is left untouched.
	pub fn enforce_with_matcher(&self, matcher: &str, request: &[RequestValue]) -> Result<bool> {
		let request_tokens = self.model.request_tokens();
		if request.len() != request_tokens.len() {
			return Err(EvalError::RequestArity {
				expected: request_tokens.len(),
				actual: request.len(),
			});
		}

		let expr = matcher::parse(matcher)?;
		let policy = self
			.model
			.assertion(Section::Policy, DEFAULT_POLICY_TYPE)
			.ok_or_else(|| EvalError::MissingPolicyDefinition(DEFAULT_POLICY_TYPE.to_string()))?;
		let eft_index = policy.tokens.iter().position(|t| t == "eft");
		let effect = self.model.effect();

		let mut effects = Vec::new();
		if policy.rules.is_empty() {
			let empty = vec![String::new(); policy.tokens.len()];
			let scope = Scope {
				request_tokens,
				request,
				policy_tokens: &policy.tokens,
				policy: &empty,
				role_managers: &self.role_managers,
			};
			if matcher::evaluate_bool(&expr, &scope)? {
				effects.push(RuleEffect::Allow);
			}
		} else {
			for rule in &policy.rules {
				let scope = Scope {
					request_tokens,
					request,
					policy_tokens: &policy.tokens,
					policy: rule,
					role_managers: &self.role_managers,
				};
				if !matcher::evaluate_bool(&expr, &scope)? {
					continue;
				}
				let eft = eft_index
					.and_then(|i| rule.get(i))
					.map(String::as_str)
					.unwrap_or("");
				let rule_effect = RuleEffect::from_eft(eft);
				trace!(?rule, ?rule_effect, "rule matched");
				effects.push(rule_effect);
				if effect.is_decisive(rule_effect) {
					break;
				}
			}
		}

		let allowed = effect.merge(&effects);
		debug!(allowed, matched = effects.len(), "request evaluated");
		Ok(allowed)
	}

	fn assertion_rules(&self, section: Section, ptype: &str) -> Result<&Vec<Vec<String>>> {
		self.model
			.assertion(section, ptype)
			.map(|a| &a.rules)
			.ok_or_else(|| EvalError::MissingPolicyDefinition(ptype.to_string()))
	}

	pub fn has_rule(&self, section: Section, ptype: &str, rule: &[String]) -> bool {
		self.model
			.assertion(section, ptype)
			.is_some_and(|a| a.has_rule(rule))
	}

	pub fn rules(&self, section: Section, ptype: &str) -> Result<Vec<Vec<String>>> {
		self.assertion_rules(section, ptype).cloned()
	}

	pub fn filtered_rules(
		&self,
		section: Section,
		ptype: &str,
		field_index: usize,
		field_values: &[String],
	) -> Result<Vec<Vec<String>>> {
		self.model
			.assertion(section, ptype)
			.map(|a| a.filtered(field_index, field_values))
			.ok_or_else(|| EvalError::MissingPolicyDefinition(ptype.to_string()))
	}

	/// Inserts `rules`, skipping those already present. Returns the rules actually added.
	pub fn add_rules(
		&mut self,
		section: Section,
		ptype: &str,
		rules: Vec<Vec<String>>,
	) -> Result<Vec<Vec<String>>> {
		let assertion = self
			.model
			.assertion_mut(section, ptype)
			.ok_or_else(|| EvalError::MissingPolicyDefinition(ptype.to_string()))?;

		let mut added = Vec::new();
		for rule in rules {
			if assertion.add_rule(rule.clone()) {
				added.push(rule);
			}
		}

		if section == Section::Grouping {
			let rm = self.role_managers.entry(ptype.to_string()).or_default();
			for rule in &added {
				if let [name, role, rest @ ..] = rule.as_slice() {
					rm.add_link(name, role, rest.first().map(String::as_str));
				}
			}
		}
		Ok(added)
	}

	/// Removes `rules`. Returns the rules that were present.
	pub fn remove_rules(
		&mut self,
		section: Section,
		ptype: &str,
		rules: &[Vec<String>],
	) -> Result<Vec<Vec<String>>> {
		let assertion = self
			.model
			.assertion_mut(section, ptype)
			.ok_or_else(|| EvalError::MissingPolicyDefinition(ptype.to_string()))?;

		let removed: Vec<Vec<String>> = rules
			.iter()
			.filter(|rule| assertion.remove_rule(rule))
			.cloned()
			.collect();

		if section == Section::Grouping && !removed.is_empty() {
			self.rebuild_role_manager(ptype);
		}
		Ok(removed)
	}

	pub fn remove_filtered_rules(
		&mut self,
		section: Section,
		ptype: &str,
		field_index: usize,
		field_values: &[String],
	) -> Result<Vec<Vec<String>>> {
		let assertion = self
			.model
			.assertion_mut(section, ptype)
			.ok_or_else(|| EvalError::MissingPolicyDefinition(ptype.to_string()))?;
		let removed = assertion.remove_filtered(field_index, field_values);

		if section == Section::Grouping && !removed.is_empty() {
			self.rebuild_role_manager(ptype);
		}
		Ok(removed)
	}

	/// Replaces every stored rule with `lines`.
	pub fn replace_rules(&mut self, lines: Vec<PolicyLine>) {
		self.model.clear_rules();
		for line in lines {
			let Some(section) = Section::of_ptype(&line.ptype) else {
				warn!(ptype = %line.ptype, "skipping policy line with unknown type");
				continue;
			};
			match self.model.assertion_mut(section, &line.ptype) {
				Some(assertion) => {
					assertion.add_rule(line.rule);
				}
				None => warn!(ptype = %line.ptype, "skipping policy line not declared by the model"),
			}
		}
		self.rebuild_role_managers();
	}

	/// Every stored rule, policies first.
	pub fn policy_lines(&self) -> Vec<PolicyLine> {
		[Section::Policy, Section::Grouping]
			.into_iter()
			.flat_map(|section| self.model.assertions(section))
			.flat_map(|assertion| {
				assertion
					.rules
					.iter()
					.map(|rule| PolicyLine::new(assertion.key.clone(), rule.clone()))
			})
			.collect()
	}

	fn rebuild_role_manager(&mut self, ptype: &str) {
		let mut rm = RoleManager::new();
		if let Some(assertion) = self.model.assertion(Section::Grouping, ptype) {
			for rule in &assertion.rules {
				if let [name, role, rest @ ..] = rule.as_slice() {
					rm.add_link(name, role, rest.first().map(String::as_str));
				}
			}
		}
		self.role_managers.insert(ptype.to_string(), rm);
	}

	fn rebuild_role_managers(&mut self) {
		let keys: Vec<String> = self
			.model
			.assertions(Section::Grouping)
			.map(|a| a.key.clone())
			.collect();
		for key in keys {
			self.rebuild_role_manager(&key);
		}
	}

	/// Distinct values of one field across the rules of `ptype`.
	pub fn values_for_field(&self, section: Section, ptype: &str, field_index: usize) -> Vec<String> {
		self.model
			.assertion(section, ptype)
			.map(|a| a.values_for_field(field_index))
			.unwrap_or_default()
	}

	fn role_manager(&self) -> Option<&RoleManager> {
		self.role_managers.get(DEFAULT_GROUPING_TYPE)
	}

	pub fn roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
		self.role_manager()
			.map(|rm| rm.roles(name, domain))
			.unwrap_or_default()
	}

	pub fn users_for_role(&self, role: &str, domain: Option<&str>) -> Vec<String> {
		self.role_manager()
			.map(|rm| rm.users(role, domain))
			.unwrap_or_default()
	}

	pub fn has_role_for_user(&self, name: &str, role: &str, domain: Option<&str>) -> bool {
		self.roles_for_user(name, domain).iter().any(|r| r == role)
	}

	pub fn implicit_roles_for_user(&self, name: &str, domain: Option<&str>) -> Vec<String> {
		self.role_manager()
			.map(|rm| rm.implicit_roles(name, domain))
			.unwrap_or_default()
	}

	pub fn domains_for_user(&self, name: &str) -> Vec<String> {
		self.role_manager()
			.map(|rm| rm.domains(name))
			.unwrap_or_default()
	}

	/// Policy rules whose subject is `name` (and whose second field is `domain`, if given).
	pub fn permissions_for_user(&self, name: &str, domain: Option<&str>) -> Vec<Vec<String>> {
		let mut filter = vec![name.to_string()];
		if let Some(domain) = domain {
			filter.push(domain.to_string());
		}
		self.model
			.assertion(Section::Policy, DEFAULT_POLICY_TYPE)
			.map(|a| a.filtered(0, &filter))
			.unwrap_or_default()
	}

	/// Permissions of `name` and of every role it inherits.
	pub fn implicit_permissions_for_user(&self, name: &str, domain: Option<&str>) -> Vec<Vec<String>> {
		std::iter::once(name.to_string())
			.chain(self.implicit_roles_for_user(name, domain))
			.flat_map(|subject| self.permissions_for_user(&subject, domain))
			.collect()
	}

	pub fn has_permission_for_user(&self, name: &str, permission: &[String]) -> bool {
		let mut rule = Vec::with_capacity(permission.len() + 1);
		rule.push(name.to_string());
		rule.extend(permission.iter().cloned());
		self.has_rule(Section::Policy, DEFAULT_POLICY_TYPE, &rule)
	}
}
