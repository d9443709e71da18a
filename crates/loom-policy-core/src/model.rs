// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Model text parsing and the per-assertion rule store.
//!
//! A model is INI-style text:
//!
//! ```text
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act
//!
//! [role_definition]
//! g = _, _
//!
//! [policy_effect]
//! e = some(where (p.eft == allow))
//!
//! [matchers]
//! m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
//! ```

use std::collections::BTreeMap;

use crate::effect::Effect;
use crate::error::ModelError;

/// Which rule collection a `ptype` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
	Policy,
	Grouping,
}

impl Section {
	pub fn key(self) -> &'static str {
		match self {
			Section::Policy => "p",
			Section::Grouping => "g",
		}
	}

	/// Classifies a rule type such as `p`, `p2` or `g2`.
	pub fn of_ptype(ptype: &str) -> Option<Self> {
		match ptype.chars().next() {
			Some('p') => Some(Section::Policy),
			Some('g') => Some(Section::Grouping),
			_ => None,
		}
	}
}

/// One `key = value` definition together with the rules stored under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
	pub key: String,
	pub value: String,
	pub tokens: Vec<String>,
	pub rules: Vec<Vec<String>>,
}

impl Assertion {
	fn new(key: &str, value: &str) -> Self {
		let tokens = value
			.split(',')
			.map(|t| t.trim().to_string())
			.filter(|t| !t.is_empty())
			.collect();
		Self {
			key: key.to_string(),
			value: value.to_string(),
			tokens,
			rules: Vec::new(),
		}
	}

	pub fn has_rule(&self, rule: &[String]) -> bool {
		self.rules.iter().any(|r| r.as_slice() == rule)
	}

	/// Appends `rule` unless an identical rule is already stored.
	pub fn add_rule(&mut self, rule: Vec<String>) -> bool {
		if self.has_rule(&rule) {
			return false;
		}
		self.rules.push(rule);
		true
	}

	pub fn remove_rule(&mut self, rule: &[String]) -> bool {
		let before = self.rules.len();
		self.rules.retain(|r| r.as_slice() != rule);
		self.rules.len() != before
	}

	/// Removes every rule matching the filter and returns the removed rules.
	pub fn remove_filtered(&mut self, field_index: usize, field_values: &[String]) -> Vec<Vec<String>> {
		let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.rules)
			.into_iter()
			.partition(|r| matches_filter(r, field_index, field_values));
		self.rules = kept;
		removed
	}

	pub fn filtered(&self, field_index: usize, field_values: &[String]) -> Vec<Vec<String>> {
		self.rules
			.iter()
			.filter(|r| matches_filter(r, field_index, field_values))
			.cloned()
			.collect()
	}

	/// Distinct values of one field, in first-seen order.
	pub fn values_for_field(&self, field_index: usize) -> Vec<String> {
		let mut values: Vec<String> = Vec::new();
		for rule in &self.rules {
			if let Some(v) = rule.get(field_index) {
				if !values.contains(v) {
					values.push(v.clone());
				}
			}
		}
		values
	}

	/// Number of `_` slots in a role definition.
	pub fn arity(&self) -> usize {
		self.tokens.len()
	}
}

/// An empty filter value matches any field content.
pub fn matches_filter(rule: &[String], field_index: usize, field_values: &[String]) -> bool {
	field_values.iter().enumerate().all(|(i, want)| {
		want.is_empty()
			|| rule
				.get(field_index + i)
				.map(|have| have == want)
				.unwrap_or(false)
	})
}

/// A parsed model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
	request: Assertion,
	policy: BTreeMap<String, Assertion>,
	grouping: BTreeMap<String, Assertion>,
	effect: Effect,
	matcher: String,
}

impl Model {
	pub fn from_text(text: &str) -> Result<Self, ModelError> {
		let mut request = None;
		let mut policy = BTreeMap::new();
		let mut grouping = BTreeMap::new();
		let mut effect = None;
		let mut matcher = None;
		let mut section: Option<String> = None;

		for (line_no, line) in logical_lines(text) {
			if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
				section = Some(name.trim().to_string());
				continue;
			}

			let Some((key, value)) = line.split_once('=') else {
				return Err(ModelError::InvalidLine {
					line: line_no,
					message: format!("expected `key = value`, got `{line}`"),
				});
			};
			let key = key.trim();
			let value = value.trim();

			match section.as_deref() {
				Some("request_definition") if key == "r" => {
					request = Some(Assertion::new(key, value));
				}
				Some("policy_definition") => {
					policy.insert(key.to_string(), Assertion::new(key, value));
				}
				Some("role_definition") => {
					let assertion = Assertion::new(key, value);
					if !(2..=3).contains(&assertion.arity()) {
						return Err(ModelError::InvalidLine {
							line: line_no,
							message: format!("role definition `{key}` must have 2 or 3 fields"),
						});
					}
					grouping.insert(key.to_string(), assertion);
				}
				Some("policy_effect") if key == "e" => {
					effect = Some(Effect::parse(value)?);
				}
				Some("matchers") if key == "m" => {
					matcher = Some(value.to_string());
				}
				Some(other) => {
					tracing::debug!(section = other, key, "ignoring unrecognised model definition");
				}
				None => {
					return Err(ModelError::InvalidLine {
						line: line_no,
						message: "definition outside of any section".to_string(),
					});
				}
			}
		}

		let request = request.ok_or(ModelError::MissingDefinition("r"))?;
		if !policy.contains_key("p") {
			return Err(ModelError::MissingDefinition("p"));
		}

		Ok(Self {
			request,
			policy,
			grouping,
			effect: effect.ok_or(ModelError::MissingDefinition("e"))?,
			matcher: matcher.ok_or(ModelError::MissingDefinition("m"))?,
		})
	}

	pub fn request_tokens(&self) -> &[String] {
		&self.request.tokens
	}

	pub fn effect(&self) -> Effect {
		self.effect
	}

	/// The pristine matcher expression.
	pub fn matcher(&self) -> &str {
		&self.matcher
	}

	pub fn assertion(&self, section: Section, ptype: &str) -> Option<&Assertion> {
		match section {
			Section::Policy => self.policy.get(ptype),
			Section::Grouping => self.grouping.get(ptype),
		}
	}

	pub fn assertion_mut(&mut self, section: Section, ptype: &str) -> Option<&mut Assertion> {
		match section {
			Section::Policy => self.policy.get_mut(ptype),
			Section::Grouping => self.grouping.get_mut(ptype),
		}
	}

	pub fn assertions(&self, section: Section) -> impl Iterator<Item = &Assertion> {
		match section {
			Section::Policy => self.policy.values(),
			Section::Grouping => self.grouping.values(),
		}
	}

	pub fn clear_rules(&mut self) {
		for assertion in self.policy.values_mut().chain(self.grouping.values_mut()) {
			assertion.rules.clear();
		}
	}
}

/// Yields `(line_number, content)` with comments stripped and `\` continuations joined.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
	let mut out = Vec::new();
	let mut pending: Option<(usize, String)> = None;

	for (idx, raw) in text.lines().enumerate() {
		let content = match raw.find('#') {
			Some(pos) => &raw[..pos],
			None => raw,
		};
		let content = content.trim();

		let (start, mut acc) = pending.take().unwrap_or((idx + 1, String::new()));
		if let Some(head) = content.strip_suffix('\\') {
			acc.push_str(head.trim_end());
			acc.push(' ');
			pending = Some((start, acc));
			continue;
		}
		acc.push_str(content);
		let acc = acc.trim().to_string();
		if !acc.is_empty() {
			out.push((start, acc));
		}
	}

	if let Some((start, acc)) = pending {
		let acc = acc.trim().to_string();
		if !acc.is_empty() {
			out.push((start, acc));
		}
	}
	out
}
