// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end service behaviour over real adapters and model files.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{fixture, fixture_text, strings, TestEnv};
use loom_policy_core::Section;
use loom_policy_server::{AbacResolver, AdapterRequest, HandleKind, PolicyError, NO_HANDLE};

#[tokio::test]
async fn rbac_decisions_from_the_fallback_connection() {
	let env = TestEnv::new();
	let handle = env.service.init_default_enforcer().await.unwrap();

	assert!(env
		.service
		.enforce(handle, &strings(&["alice", "data1", "read"]))
		.await
		.unwrap());
	// Granted through the data2_admin role.
	assert!(env
		.service
		.enforce(handle, &strings(&["alice", "data2", "read"]))
		.await
		.unwrap());
	assert!(!env
		.service
		.enforce(handle, &strings(&["alice", "data1", "write"]))
		.await
		.unwrap());
	assert!(!env
		.service
		.enforce(handle, &strings(&["bob", "data1", "read"]))
		.await
		.unwrap());
}

#[tokio::test]
async fn explicit_adapter_and_inline_model() {
	let env = TestEnv::new();
	let adapter = env
		.service
		.new_adapter(AdapterRequest {
			driver: "file".to_string(),
			connection: env.policy_path.to_string_lossy().into_owned(),
			db_specified: false,
		})
		.await
		.unwrap();
	let handle = env
		.service
		.new_enforcer(&fixture_text("rbac_model.conf"), adapter)
		.await
		.unwrap();

	assert!(env
		.service
		.enforce(handle, &strings(&["bob", "data2", "write"]))
		.await
		.unwrap());
	assert!(!env
		.service
		.enforce(handle, &strings(&["bob", "data2", "read"]))
		.await
		.unwrap());
}

#[tokio::test]
async fn abac_owner_check() {
	let env = TestEnv::new();
	let handle = env
		.service
		.new_enforcer(&fixture_text("abac_model.conf"), NO_HANDLE)
		.await
		.unwrap();

	let document = r#"ABAC::{"name":"report","owner":"alice"}"#;
	let alice = r#"ABAC::{"name":"alice"}"#;
	let bob = r#"ABAC::{"name":"bob"}"#;

	assert!(env
		.service
		.enforce(handle, &strings(&[alice, document, "read"]))
		.await
		.unwrap());
	assert!(!env
		.service
		.enforce(handle, &strings(&[bob, document, "read"]))
		.await
		.unwrap());
}

#[tokio::test]
async fn concurrent_registrations_get_distinct_handles() {
	let env = TestEnv::new();
	let model = Arc::new(fixture_text("rbac_model.conf"));

	let tasks: Vec<_> = (0..1000)
		.map(|_| {
			let service = Arc::clone(&env.service);
			let model = Arc::clone(&model);
			tokio::spawn(async move { service.new_enforcer(&model, NO_HANDLE).await.unwrap() })
		})
		.collect();

	let mut handles = HashSet::new();
	for task in tasks {
		assert!(handles.insert(task.await.unwrap()));
	}
	assert_eq!(handles.len(), 1000);
	assert_eq!(env.service.registry().enforcer_count(), 1000);
	for handle in handles {
		assert!(env.service.registry().enforcer(handle).is_ok());
	}
}

#[tokio::test]
async fn unknown_enforcer_handle() {
	let env = TestEnv::new();
	let result = env
		.service
		.enforce(4242, &strings(&["alice", "data1", "read"]))
		.await;
	assert!(matches!(
		result,
		Err(PolicyError::NotFound {
			kind: HandleKind::Enforcer,
			handle: 4242
		})
	));
}

#[tokio::test]
async fn unknown_adapter_handle() {
	let env = TestEnv::new();
	let result = env.service.new_enforcer(&fixture_text("rbac_model.conf"), 7).await;
	assert!(matches!(
		result,
		Err(PolicyError::NotFound {
			kind: HandleKind::Adapter,
			handle: 7
		})
	));
	assert_eq!(env.service.registry().enforcer_count(), 0);
}

#[tokio::test]
async fn unsupported_driver_registers_nothing() {
	let env = TestEnv::new();
	let result = env
		.service
		.new_adapter(AdapterRequest {
			driver: "oracle".to_string(),
			connection: "oracle://db:1521".to_string(),
			db_specified: false,
		})
		.await;

	match result {
		Err(PolicyError::UnsupportedDriver { driver, supported }) => {
			assert_eq!(driver, "oracle");
			assert!(supported.iter().any(|d| d == "postgres"));
		}
		other => panic!("expected unsupported driver, got {other:?}"),
	}
	assert_eq!(env.service.registry().adapter_count(), 0);
}

#[test]
fn fifteen_attributes_bind_eleven_slots() {
	let attributes: serde_json::Map<String, serde_json::Value> = ('a'..='o')
		.map(|c| (format!("attr_{c}"), serde_json::Value::from(c.to_string())))
		.collect();
	let payload = format!("ABAC::{}", serde_json::Value::Object(attributes));

	let (bundle, _) = AbacResolver::default().resolve(&payload, "true").unwrap();
	assert_eq!(bundle.bindings().len(), 11);
	assert_eq!(bundle.dropped(), strings(&["attr_l", "attr_m", "attr_n", "attr_o"]));
	assert_eq!(bundle.value("V10"), Some("k"));
}

#[tokio::test]
async fn rule_changes_are_written_through_to_the_file() {
	let env = TestEnv::new();
	let handle = env.service.init_default_enforcer().await.unwrap();

	assert!(env
		.service
		.add_rule(handle, Section::Policy, "p", strings(&["carol", "data3", "read"]))
		.await
		.unwrap());
	env.service.save_policy(handle).await.unwrap();

	let saved = std::fs::read_to_string(&env.policy_path).unwrap();
	assert!(saved.contains("carol"));

	let reloaded = env.service.init_default_enforcer().await.unwrap();
	assert_ne!(reloaded, handle);
	assert!(env
		.service
		.enforce(reloaded, &strings(&["carol", "data3", "read"]))
		.await
		.unwrap());
}

#[tokio::test]
async fn missing_model_file_is_a_config_error() {
	let env = TestEnv::new();
	let connection_config = env.dir.path().join("connection_config.json");
	let body = serde_json::json!({
		"driver": "file",
		"connection": env.policy_path.to_string_lossy(),
		"enforcer": fixture("does_not_exist.conf").to_string_lossy(),
	});
	std::fs::write(&connection_config, body.to_string()).unwrap();

	let result = env.service.new_enforcer("", NO_HANDLE).await;
	assert!(matches!(result, Err(PolicyError::ConfigLoad(_))));
}

#[tokio::test]
async fn default_enforcer_is_shared_by_concurrent_callers() {
	let env = TestEnv::new();
	let service = &env.service;

	let (a, b, c) = tokio::join!(
		service.default_enforcer_handle(),
		service.default_enforcer_handle(),
		service.default_enforcer_handle(),
	);
	let a = a.unwrap();
	assert_eq!(a, b.unwrap());
	assert_eq!(a, c.unwrap());
	assert_eq!(service.registry().enforcer_count(), 1);

	// Explicit creation still registers a fresh enforcer per call.
	let fresh = service.new_enforcer("", NO_HANDLE).await.unwrap();
	assert_ne!(fresh, a);
	assert_eq!(service.registry().enforcer_count(), 2);
	assert_eq!(service.default_enforcer_handle().await.unwrap(), a);
}
