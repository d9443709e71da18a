// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod abac;
mod http;
mod logging;
mod policy;

pub use abac::{AbacConfig, AbacConfigLayer, DEFAULT_SLOT_WIDTH, MAX_SLOT_WIDTH};
pub use http::{HttpConfig, HttpConfigLayer, DEFAULT_HOST, DEFAULT_PORT};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use policy::{
	PolicyConfig, PolicyConfigLayer, DEFAULT_CONNECTION_CONFIG_PATH, DEFAULT_IO_TIMEOUT_SECS,
	DEFAULT_LIVENESS_FILE, DEFAULT_SHUTDOWN_GRACE_SECS,
};
