// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute bundles: `ABAC::{json}` request parameters.
//!
//! The engine reads record fields by static name, so each attribute of a bundle
//! is assigned a positional slot (`V0`, `V1`, ...) and the matcher's `.Name`
//! references are rewritten to `.V<n>` for the duration of one call.
//!
//! Attributes are assigned slots in lexical order of their names. Attributes
//! beyond the slot width are dropped: they get no slot, no value and no rewrite.

use std::sync::Arc;

use loom_policy_core::{Record, RequestValue};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PolicyError;

pub use loom_policy_config::DEFAULT_SLOT_WIDTH;

/// Prefix marking a parameter as an attribute bundle.
pub const ABAC_TAG: &str = "ABAC::";

/// Returns the JSON body of a tagged parameter.
pub fn strip_tag(param: &str) -> Option<&str> {
	param.strip_prefix(ABAC_TAG)
}

/// Wraps a JSON object as a tagged parameter.
pub fn make_tagged(attributes: &Map<String, Value>) -> String {
	format!("{ABAC_TAG}{}", Value::Object(attributes.clone()))
}

pub fn slot_name(index: usize) -> String {
	format!("V{index}")
}

/// `owner` -> `Owner`.
fn capitalize(name: &str) -> String {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

fn stringify(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

/// One attribute's position in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBinding {
	pub attribute: String,
	/// Field name as referenced in matchers, e.g. `Owner`.
	pub field: String,
	pub slot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBundle {
	bindings: Vec<SlotBinding>,
	values: Record,
	dropped: Vec<String>,
}

impl AttributeBundle {
	/// Parses the JSON body of a bundle (without the tag).
	pub fn parse(json: &str, slot_width: usize) -> Result<Self, PolicyError> {
		let object: Map<String, Value> =
			serde_json::from_str(json).map_err(PolicyError::MalformedAttributeBundle)?;

		let mut attributes: Vec<(String, Value)> = object.into_iter().collect();
		attributes.sort_by(|a, b| a.0.cmp(&b.0));

		let mut bundle = AttributeBundle {
			values: (0..slot_width).map(|i| (slot_name(i), String::new())).collect(),
			..Default::default()
		};

		for (index, (attribute, value)) in attributes.into_iter().enumerate() {
			if index >= slot_width {
				bundle.dropped.push(attribute);
				continue;
			}
			let slot = slot_name(index);
			bundle.values.insert(slot.clone(), stringify(&value));
			bundle.bindings.push(SlotBinding {
				field: capitalize(&attribute),
				attribute,
				slot,
			});
		}

		if !bundle.dropped.is_empty() {
			warn!(
				dropped = ?bundle.dropped,
				slot_width,
				"attribute bundle exceeds slot width, excess attributes ignored"
			);
		}
		Ok(bundle)
	}

	pub fn bindings(&self) -> &[SlotBinding] {
		&self.bindings
	}

	/// Attributes that did not fit into a slot.
	pub fn dropped(&self) -> &[String] {
		&self.dropped
	}

	pub fn value(&self, slot: &str) -> Option<&str> {
		self.values.get(slot).map(String::as_str)
	}

	pub fn into_request_value(self) -> RequestValue {
		RequestValue::Record(self.values)
	}
}

/// Rewrites matcher field references to slot references.
pub trait MatcherRewriter: Send + Sync {
	fn rewrite(&self, formula: &str, bindings: &[SlotBinding]) -> String;
}

/// Replaces every `.Field` substring with `.V<n>` in a single left-to-right pass.
///
/// At each `.` the longest matching field wins, and replaced text is never
/// rescanned, so a slot name can not itself be rewritten by a later binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualRewriter;

impl MatcherRewriter for TextualRewriter {
	fn rewrite(&self, formula: &str, bindings: &[SlotBinding]) -> String {
		let mut candidates: Vec<&SlotBinding> =
			bindings.iter().filter(|b| !b.field.is_empty()).collect();
		// Stable sort keeps the earlier slot first among equal fields.
		candidates.sort_by(|a, b| b.field.len().cmp(&a.field.len()));

		let mut out = String::with_capacity(formula.len());
		let mut rest = formula;
		while let Some(dot) = rest.find('.') {
			out.push_str(&rest[..=dot]);
			rest = &rest[dot + 1..];
			if let Some(binding) = candidates.iter().find(|b| rest.starts_with(b.field.as_str())) {
				out.push_str(&binding.slot);
				rest = &rest[binding.field.len()..];
			}
		}
		out.push_str(rest);
		out
	}
}

/// Turns tagged parameters into positional records and rewrites the matcher.
#[derive(Clone)]
pub struct AbacResolver {
	slot_width: usize,
	rewriter: Arc<dyn MatcherRewriter>,
}

impl Default for AbacResolver {
	fn default() -> Self {
		Self::new(DEFAULT_SLOT_WIDTH)
	}
}

impl AbacResolver {
	pub fn new(slot_width: usize) -> Self {
		Self::with_rewriter(slot_width, Arc::new(TextualRewriter))
	}

	pub fn with_rewriter(slot_width: usize, rewriter: Arc<dyn MatcherRewriter>) -> Self {
		Self {
			slot_width,
			rewriter,
		}
	}

	pub fn slot_width(&self) -> usize {
		self.slot_width
	}

	/// Resolves `payload` (tagged or bare JSON) against `formula`.
	///
	/// `formula` is never modified; the rewritten copy is returned.
	pub fn resolve(&self, payload: &str, formula: &str) -> Result<(AttributeBundle, String), PolicyError> {
		let json = strip_tag(payload).unwrap_or(payload);
		let bundle = AttributeBundle::parse(json, self.slot_width)?;
		let rewritten = self.rewriter.rewrite(formula, bundle.bindings());
		debug!(bound = bundle.bindings().len(), %rewritten, "attribute bundle resolved");
		Ok((bundle, rewritten))
	}
}
