// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// Errors raised while parsing model text.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
	#[error("model is missing required definition `{0}`")]
	MissingDefinition(&'static str),

	#[error("model line {line}: {message}")]
	InvalidLine { line: usize, message: String },

	#[error("unsupported policy effect `{0}`")]
	UnsupportedEffect(String),
}

/// Errors raised while evaluating a matcher against a request.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
	#[error("matcher syntax error at offset {offset}: {message}")]
	Syntax { offset: usize, message: String },

	#[error("request has {actual} values but the request definition declares {expected}")]
	RequestArity { expected: usize, actual: usize },

	#[error("unknown identifier `{0}`")]
	UnknownIdentifier(String),

	#[error("`{target}` has no field `{field}`")]
	NoSuchField { target: String, field: String },

	#[error("unknown function `{0}`")]
	UnknownFunction(String),

	#[error("function `{name}` expects {expected} arguments, got {actual}")]
	FunctionArity {
		name: String,
		expected: &'static str,
		actual: usize,
	},

	#[error("type mismatch: {0}")]
	TypeMismatch(String),

	#[error("invalid regular expression: {0}")]
	Regex(#[from] regex::Error),

	#[error("model has no policy definition `{0}`")]
	MissingPolicyDefinition(String),
}

/// Errors raised by persistence adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
	#[error("operation not implemented by this adapter")]
	NotImplemented,

	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid policy line {line}: {message}")]
	InvalidLine { line: usize, message: String },

	#[error("rule for `{ptype}` has {actual} fields, at most {max} can be stored")]
	TooManyFields {
		ptype: String,
		max: usize,
		actual: usize,
	},

	#[error("database error: {0}")]
	Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;
