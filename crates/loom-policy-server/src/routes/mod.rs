// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP routes.

pub mod enforce;
pub mod health;
pub mod rpc;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::service::PolicyService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PolicyService>,
}

impl AppState {
	pub fn new(service: Arc<PolicyService>) -> Self {
		Self { service }
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health::health_check))
		.route("/enforce", post(enforce::enforce))
		.route("/rpc/{method}", post(rpc::call))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
