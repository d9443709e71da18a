// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence seam between an [`Enforcer`](crate::Enforcer) and policy storage.

use async_trait::async_trait;

use crate::error::AdapterError;

/// One stored rule together with its type (`p`, `g`, `g2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyLine {
	pub ptype: String,
	pub rule: Vec<String>,
}

impl PolicyLine {
	pub fn new(ptype: impl Into<String>, rule: Vec<String>) -> Self {
		Self {
			ptype: ptype.into(),
			rule,
		}
	}

	/// Parses `p, alice, data1, read`. Blank lines and `#` comments yield `None`.
	pub fn parse_csv(line: &str) -> Option<Self> {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			return None;
		}
		let mut fields = split_fields(line).into_iter();
		let ptype = fields.next()?;
		if ptype.is_empty() {
			return None;
		}
		Some(Self {
			ptype,
			rule: fields.collect(),
		})
	}

	pub fn to_csv(&self) -> String {
		std::iter::once(self.ptype.as_str())
			.chain(self.rule.iter().map(String::as_str))
			.map(|field| {
				if field.contains(',') || field.contains('"') {
					format!("\"{}\"", field.replace('"', "\"\""))
				} else {
					field.to_string()
				}
			})
			.collect::<Vec<_>>()
			.join(", ")
	}
}

fn split_fields(line: &str) -> Vec<String> {
	let mut fields = Vec::new();
	let mut current = String::new();
	let mut quoted = false;
	let mut chars = line.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			'"' if quoted && chars.peek() == Some(&'"') => {
				current.push('"');
				chars.next();
			}
			'"' => quoted = !quoted,
			',' if !quoted => {
				fields.push(current.trim().to_string());
				current.clear();
			}
			_ => current.push(c),
		}
	}
	fields.push(current.trim().to_string());
	fields
}

/// Policy storage backend.
///
/// Incremental operations default to [`AdapterError::NotImplemented`]; callers
/// treat that as "the in-memory change is authoritative until the next save".
#[async_trait]
pub trait Adapter: Send + Sync {
	/// Driver name this adapter was built for, e.g. `file` or `postgres`.
	fn driver(&self) -> &str;

	async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError>;

	async fn save_policy(&self, lines: &[PolicyLine]) -> Result<(), AdapterError>;

	async fn add_policies(&self, _ptype: &str, _rules: &[Vec<String>]) -> Result<(), AdapterError> {
		Err(AdapterError::NotImplemented)
	}

	async fn remove_policies(&self, _ptype: &str, _rules: &[Vec<String>]) -> Result<(), AdapterError> {
		Err(AdapterError::NotImplemented)
	}

	async fn remove_filtered_policy(
		&self,
		_ptype: &str,
		_field_index: usize,
		_field_values: &[String],
	) -> Result<(), AdapterError> {
		Err(AdapterError::NotImplemented)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_simple_line() {
		let line = PolicyLine::parse_csv("p, alice, data1, read").unwrap();
		assert_eq!(line.ptype, "p");
		assert_eq!(line.rule, vec!["alice", "data1", "read"]);
	}

	#[test]
	fn skips_comments_and_blank_lines() {
		assert!(PolicyLine::parse_csv("   ").is_none());
		assert!(PolicyLine::parse_csv("# p, alice").is_none());
	}

	#[test]
	fn quoted_fields_may_contain_commas() {
		let line = PolicyLine::parse_csv(r#"p, alice, "a,b", "say ""hi""""#).unwrap();
		assert_eq!(line.rule, vec!["alice", "a,b", "say \"hi\""]);
		assert_eq!(
			PolicyLine::parse_csv(&line.to_csv()).unwrap(),
			line
		);
	}

	struct LoadOnly;

	#[async_trait]
	impl Adapter for LoadOnly {
		fn driver(&self) -> &str {
			"memory"
		}

		async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
			Ok(Vec::new())
		}

		async fn save_policy(&self, _lines: &[PolicyLine]) -> Result<(), AdapterError> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn incremental_operations_default_to_not_implemented() {
		let adapter = LoadOnly;
		assert!(matches!(
			adapter.add_policies("p", &[]).await,
			Err(AdapterError::NotImplemented)
		));
		assert!(matches!(
			adapter.remove_filtered_policy("p", 0, &[]).await,
			Err(AdapterError::NotImplemented)
		));
	}
}
