// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Plain HTTP decision endpoint for callers without an RPC client.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::error::{ErrorResponse, PolicyError};
use crate::registry::NO_HANDLE;
use crate::rpc::EnforceRequest;

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
	pub res: bool,
}

async fn decide(state: &AppState, request: &EnforceRequest) -> Result<bool, PolicyError> {
	let handle = match request.enforcer_handler {
		NO_HANDLE => state.service.default_enforcer_handle().await?,
		handle => handle,
	};
	state.service.enforce(handle, &request.params).await
}

fn failure(status: StatusCode, error: &PolicyError) -> Response {
	let body = ErrorResponse {
		error: error.code().to_string(),
		message: error.to_string(),
	};
	(status, Json(body)).into_response()
}

/// POST /enforce
///
/// 200 when allowed, 403 when denied, 400 for an unreadable body and 500 for
/// any failure while deciding. A handle of `-1` uses the shared default enforcer.
pub async fn enforce(
	State(state): State<AppState>,
	body: Result<Json<EnforceRequest>, JsonRejection>,
) -> Response {
	let request = match body {
		Ok(Json(request)) => request,
		Err(rejection) => {
			let error = PolicyError::invalid_request(rejection.body_text());
			return failure(StatusCode::BAD_REQUEST, &error);
		}
	};

	match decide(&state, &request).await {
		Ok(true) => (StatusCode::OK, Json(DecisionResponse { res: true })).into_response(),
		Ok(false) => (StatusCode::FORBIDDEN, Json(DecisionResponse { res: false })).into_response(),
		Err(error) => {
			warn!(handle = request.enforcer_handler, %error, "side-channel decision failed");
			failure(StatusCode::INTERNAL_SERVER_ERROR, &error)
		}
	}
}
