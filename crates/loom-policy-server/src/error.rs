// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loom_policy_config::ConfigError;
use loom_policy_core::{AdapterError, EvalError, ModelError};
use serde::Serialize;

use crate::registry::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
	Enforcer,
	Adapter,
}

impl fmt::Display for HandleKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HandleKind::Enforcer => f.write_str("enforcer"),
			HandleKind::Adapter => f.write_str("adapter"),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
	#[error("{kind} {handle} not found")]
	NotFound { kind: HandleKind, handle: Handle },

	#[error("unsupported driver `{driver}`, supported drivers: {}", .supported.join(", "))]
	UnsupportedDriver {
		driver: String,
		supported: Vec<String>,
	},

	#[error("malformed attribute bundle: {0}")]
	MalformedAttributeBundle(#[source] serde_json::Error),

	#[error("evaluation failed: {0}")]
	Evaluation(#[from] EvalError),

	#[error("failed to load connection configuration: {0}")]
	ConfigLoad(#[from] ConfigError),

	#[error("invalid model: {0}")]
	Model(#[from] ModelError),

	#[error("adapter error: {0}")]
	Adapter(#[from] AdapterError),

	#[error("{operation} timed out after {}s", .timeout.as_secs())]
	Timeout {
		operation: &'static str,
		timeout: Duration,
	},

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("unknown method `{0}`")]
	UnknownMethod(String),
}

impl PolicyError {
	pub fn not_found(kind: HandleKind, handle: Handle) -> Self {
		PolicyError::NotFound { kind, handle }
	}

	pub fn invalid_request(message: impl Into<String>) -> Self {
		PolicyError::InvalidRequest(message.into())
	}

	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			PolicyError::NotFound { .. } => "not_found",
			PolicyError::UnsupportedDriver { .. } => "unsupported_driver",
			PolicyError::MalformedAttributeBundle(_) => "malformed_attribute_bundle",
			PolicyError::Evaluation(_) => "evaluation_error",
			PolicyError::ConfigLoad(_) => "config_load_error",
			PolicyError::Model(_) => "invalid_model",
			PolicyError::Adapter(_) => "adapter_error",
			PolicyError::Timeout { .. } => "timeout",
			PolicyError::InvalidRequest(_) => "invalid_request",
			PolicyError::UnknownMethod(_) => "unknown_method",
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			PolicyError::NotFound { .. } | PolicyError::UnknownMethod(_) => StatusCode::NOT_FOUND,
			PolicyError::UnsupportedDriver { .. }
			| PolicyError::MalformedAttributeBundle(_)
			| PolicyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
			PolicyError::Evaluation(_) | PolicyError::Model(_) => StatusCode::UNPROCESSABLE_ENTITY,
			PolicyError::ConfigLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
			PolicyError::Adapter(_) => StatusCode::BAD_GATEWAY,
			PolicyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl IntoResponse for PolicyError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			tracing::error!(error = %self, code = self.code(), "request failed");
		} else {
			tracing::debug!(error = %self, code = self.code(), "request rejected");
		}
		let body = ErrorResponse {
			error: self.code().to_string(),
			message: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unsupported_driver_lists_supported_set() {
		let err = PolicyError::UnsupportedDriver {
			driver: "oracle".to_string(),
			supported: vec!["file".to_string(), "mysql".to_string()],
		};
		assert_eq!(
			err.to_string(),
			"unsupported driver `oracle`, supported drivers: file, mysql"
		);
		assert_eq!(err.status(), StatusCode::BAD_REQUEST);
	}

	#[test]
	fn not_found_names_the_kind() {
		let err = PolicyError::not_found(HandleKind::Adapter, 7);
		assert_eq!(err.to_string(), "adapter 7 not found");
		assert_eq!(err.status(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn timeout_maps_to_gateway_timeout() {
		let err = PolicyError::Timeout {
			operation: "load_policy",
			timeout: Duration::from_secs(30),
		};
		assert_eq!(err.to_string(), "load_policy timed out after 30s");
		assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
	}
}
