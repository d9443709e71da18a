// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in matcher functions.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EvalError, Result};

static PATH_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":[^/]+").unwrap());

pub(crate) fn call(name: &str, args: &[String]) -> Result<bool> {
	let pair = || match args {
		[a, b] => Ok((a.as_str(), b.as_str())),
		_ => Err(EvalError::FunctionArity {
			name: name.to_string(),
			expected: "2",
			actual: args.len(),
		}),
	};

	match name {
		"keyMatch" => pair().map(|(a, b)| key_match(a, b)),
		"keyMatch2" => {
			let (a, b) = pair()?;
			key_match2(a, b)
		}
		"regexMatch" => {
			let (a, b) = pair()?;
			regex_match(a, b)
		}
		_ => Err(EvalError::UnknownFunction(name.to_string())),
	}
}

/// `/foo/bar` matches `/foo/*`.
pub fn key_match(key1: &str, key2: &str) -> bool {
	match key2.find('*') {
		None => key1 == key2,
		Some(i) if key1.len() > i => key1.get(..i) == key2.get(..i),
		Some(i) => Some(key1) == key2.get(..i),
	}
}

/// `/resource1` matches `/:resource`, `/foo/bar` matches `/foo/*`.
pub fn key_match2(key1: &str, key2: &str) -> Result<bool> {
	let pattern = key2.replace("/*", "/.*");
	let pattern = PATH_PARAM.replace_all(&pattern, "[^/]+");
	regex_match(key1, &format!("^{pattern}$"))
}

pub fn regex_match(key1: &str, pattern: &str) -> Result<bool> {
	Ok(Regex::new(pattern)?.is_match(key1))
}
