// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request values handed to the matcher.

use std::collections::BTreeMap;

/// A record with statically named string fields, addressed as `r.obj.Field`.
pub type Record = BTreeMap<String, String>;

/// One positional request value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValue {
	Str(String),
	Record(Record),
}

impl RequestValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			RequestValue::Str(s) => Some(s),
			RequestValue::Record(_) => None,
		}
	}
}

impl From<&str> for RequestValue {
	fn from(value: &str) -> Self {
		RequestValue::Str(value.to_string())
	}
}

impl From<String> for RequestValue {
	fn from(value: String) -> Self {
		RequestValue::Str(value)
	}
}

impl From<Record> for RequestValue {
	fn from(value: Record) -> Self {
		RequestValue::Record(value)
	}
}
