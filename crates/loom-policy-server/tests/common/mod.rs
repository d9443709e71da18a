// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use loom_policy_server::{AbacResolver, AdapterFactory, HandleRegistry, PolicyService};
use tempfile::TempDir;

pub fn fixture(name: &str) -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn fixture_text(name: &str) -> String {
	std::fs::read_to_string(fixture(name)).unwrap()
}

pub fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|s| s.to_string()).collect()
}

/// A service whose fallback connection points at a private copy of the RBAC policy.
pub struct TestEnv {
	pub dir: TempDir,
	pub policy_path: PathBuf,
	pub service: Arc<PolicyService>,
}

impl TestEnv {
	pub fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let policy_path = dir.path().join("policy.csv");
		std::fs::copy(fixture("rbac_policy.csv"), &policy_path).unwrap();

		let connection_config = dir.path().join("connection_config.json");
		let body = serde_json::json!({
			"driver": "file",
			"connection": policy_path.to_string_lossy(),
			"enforcer": fixture("rbac_model.conf").to_string_lossy(),
			"dbSpecified": false,
		});
		std::fs::write(&connection_config, body.to_string()).unwrap();

		let service = PolicyService::with_parts(
			Arc::new(HandleRegistry::new()),
			AdapterFactory::new(&connection_config, Duration::from_secs(5)),
			AbacResolver::default(),
			Duration::from_secs(5),
		);

		Self {
			dir,
			policy_path,
			service: Arc::new(service),
		}
	}
}
