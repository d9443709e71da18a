// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use super::AppState;
use crate::deadline;
use crate::error::PolicyError;
use crate::rpc::{dispatch, Reply};

/// Body field carrying the caller's deadline in milliseconds.
pub const TIMEOUT_FIELD: &str = "timeoutMs";

/// POST /rpc/{method}
pub async fn call(
	State(state): State<AppState>,
	Path(method): Path<String>,
	body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Reply>, PolicyError> {
	let Json(body) = body.map_err(|e| PolicyError::invalid_request(e.body_text()))?;
	let timeout = caller_timeout(&body)?;
	deadline::scope(timeout, dispatch(&state.service, &method, body))
		.await
		.map(Json)
}

fn caller_timeout(body: &Value) -> Result<Option<Duration>, PolicyError> {
	match body.get(TIMEOUT_FIELD) {
		None | Some(Value::Null) => Ok(None),
		Some(value) => match value.as_u64() {
			Some(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
			_ => Err(PolicyError::invalid_request(format!(
				"{TIMEOUT_FIELD} must be a positive integer"
			))),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn absent_timeout_leaves_server_limit() {
		assert_eq!(caller_timeout(&json!({"handler": 0})).unwrap(), None);
		assert_eq!(caller_timeout(&json!({"timeoutMs": null})).unwrap(), None);
	}

	#[test]
	fn timeout_is_read_in_milliseconds() {
		assert_eq!(
			caller_timeout(&json!({"timeoutMs": 1500})).unwrap(),
			Some(Duration::from_millis(1500))
		);
	}

	#[test]
	fn non_positive_timeouts_are_rejected() {
		for body in [
			json!({"timeoutMs": 0}),
			json!({"timeoutMs": -5}),
			json!({"timeoutMs": "soon"}),
		] {
			assert!(matches!(
				caller_timeout(&body),
				Err(PolicyError::InvalidRequest(_))
			));
		}
	}
}
