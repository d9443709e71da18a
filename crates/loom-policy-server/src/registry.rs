// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Handle registry for enforcers and adapters.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use loom_policy_core::Adapter;
use tracing::debug;

use crate::error::{HandleKind, PolicyError};
use crate::instance::EnforcerInstance;

pub type Handle = i64;

/// Sentinel meaning "no handle", e.g. an enforcer without an adapter.
pub const NO_HANDLE: Handle = -1;

/// Issues handles and stores the instances behind them.
///
/// Handles are taken from a per-collection atomic counter, so they are unique
/// and never reused. Entries are never removed.
pub struct HandleRegistry {
	enforcers: DashMap<Handle, Arc<EnforcerInstance>>,
	adapters: DashMap<Handle, Arc<dyn Adapter>>,
	next_enforcer: AtomicI64,
	next_adapter: AtomicI64,
}

impl Default for HandleRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl HandleRegistry {
	pub fn new() -> Self {
		Self {
			enforcers: DashMap::new(),
			adapters: DashMap::new(),
			next_enforcer: AtomicI64::new(0),
			next_adapter: AtomicI64::new(0),
		}
	}

	pub fn register_enforcer(&self, instance: Arc<EnforcerInstance>) -> Handle {
		let handle = self.next_enforcer.fetch_add(1, Ordering::SeqCst);
		self.enforcers.insert(handle, instance);
		debug!(handle, "registered enforcer");
		handle
	}

	pub fn register_adapter(&self, adapter: Arc<dyn Adapter>) -> Handle {
		let handle = self.next_adapter.fetch_add(1, Ordering::SeqCst);
		debug!(handle, driver = adapter.driver(), "registered adapter");
		self.adapters.insert(handle, adapter);
		handle
	}

	pub fn enforcer(&self, handle: Handle) -> Result<Arc<EnforcerInstance>, PolicyError> {
		self.enforcers
			.get(&handle)
			.map(|entry| Arc::clone(entry.value()))
			.ok_or(PolicyError::not_found(HandleKind::Enforcer, handle))
	}

	pub fn adapter(&self, handle: Handle) -> Result<Arc<dyn Adapter>, PolicyError> {
		self.adapters
			.get(&handle)
			.map(|entry| Arc::clone(entry.value()))
			.ok_or(PolicyError::not_found(HandleKind::Adapter, handle))
	}

	pub fn enforcer_count(&self) -> usize {
		self.enforcers.len()
	}

	pub fn adapter_count(&self) -> usize {
		self.adapters.len()
	}
}
