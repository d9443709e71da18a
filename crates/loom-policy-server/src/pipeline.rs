// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One decision request, from handle to boolean.

use std::sync::Arc;

use loom_policy_core::RequestValue;
use tracing::{debug, instrument};

use crate::abac::{strip_tag, AbacResolver};
use crate::error::PolicyError;
use crate::registry::{Handle, HandleRegistry};

#[derive(Clone)]
pub struct EnforcementPipeline {
	registry: Arc<HandleRegistry>,
	resolver: AbacResolver,
}

impl EnforcementPipeline {
	pub fn new(registry: Arc<HandleRegistry>, resolver: AbacResolver) -> Self {
		Self { registry, resolver }
	}

	pub fn resolver(&self) -> &AbacResolver {
		&self.resolver
	}

	/// Evaluates `params` against the enforcer behind `handle`.
	///
	/// Each attribute bundle rewrites the formula produced by the previous one.
	/// The rewritten matcher lives only for this call.
	#[instrument(skip(self, params), fields(params = params.len()))]
	pub async fn decide(&self, handle: Handle, params: &[String]) -> Result<bool, PolicyError> {
		let instance = self.registry.enforcer(handle)?;
		let enforcer = instance.read().await;

		let mut formula = enforcer.matcher().to_string();
		let mut values = Vec::with_capacity(params.len());
		for param in params {
			match strip_tag(param) {
				Some(payload) => {
					let (bundle, rewritten) = self.resolver.resolve(payload, &formula)?;
					formula = rewritten;
					values.push(bundle.into_request_value());
				}
				None => values.push(RequestValue::Str(param.clone())),
			}
		}

		let allowed = enforcer.enforce_with_matcher(&formula, &values)?;
		debug!(handle, allowed, "decision made");
		Ok(allowed)
	}
}
