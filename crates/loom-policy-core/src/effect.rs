// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy effect expressions and how matched rules combine into a decision.

use crate::error::ModelError;

/// The effect a single matched rule contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
	Allow,
	Deny,
	/// Any `eft` value other than `allow`/`deny`.
	Indeterminate,
}

impl RuleEffect {
	pub fn from_eft(value: &str) -> Self {
		match value {
			"allow" | "" => RuleEffect::Allow,
			"deny" => RuleEffect::Deny,
			_ => RuleEffect::Indeterminate,
		}
	}
}

/// Supported `[policy_effect]` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
	/// `some(where (p.eft == allow))`
	AllowOverride,
	/// `!some(where (p.eft == deny))`
	DenyOverride,
	/// `some(where (p.eft == allow)) && !some(where (p.eft == deny))`
	AllowAndDeny,
}

impl Effect {
	pub fn parse(expr: &str) -> Result<Self, ModelError> {
		let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
		match compact.as_str() {
			"some(where(p.eft==allow))" => Ok(Effect::AllowOverride),
			"!some(where(p.eft==deny))" => Ok(Effect::DenyOverride),
			"some(where(p.eft==allow))&&!some(where(p.eft==deny))" => Ok(Effect::AllowAndDeny),
			_ => Err(ModelError::UnsupportedEffect(expr.trim().to_string())),
		}
	}

	/// Whether evaluation can stop once `effect` has been observed.
	pub fn is_decisive(self, effect: RuleEffect) -> bool {
		match self {
			Effect::AllowOverride => effect == RuleEffect::Allow,
			Effect::DenyOverride | Effect::AllowAndDeny => effect == RuleEffect::Deny,
		}
	}

	/// Combines the effects of all matched rules.
	pub fn merge(self, effects: &[RuleEffect]) -> bool {
		let any_allow = effects.contains(&RuleEffect::Allow);
		let any_deny = effects.contains(&RuleEffect::Deny);
		match self {
			Effect::AllowOverride => any_allow,
			Effect::DenyOverride => !any_deny,
			Effect::AllowAndDeny => any_allow && !any_deny,
		}
	}
}
