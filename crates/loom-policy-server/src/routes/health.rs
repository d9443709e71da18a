// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub enforcers: usize,
	pub adapters: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
	let registry = state.service.registry();
	Json(HealthResponse {
		status: "ok",
		enforcers: registry.enforcer_count(),
		adapters: registry.adapter_count(),
	})
}
