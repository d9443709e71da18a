// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use loom_policy_core::{Adapter, AdapterError, PolicyLine};

/// CSV policy file, one rule per line: `p, alice, data1, read`.
///
/// Only whole-file load and save are supported.
#[derive(Debug, Clone)]
pub struct FileAdapter {
	path: PathBuf,
}

impl FileAdapter {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn io_error(&self, source: std::io::Error) -> AdapterError {
		AdapterError::Io {
			path: self.path.clone(),
			source,
		}
	}
}

#[async_trait]
impl Adapter for FileAdapter {
	fn driver(&self) -> &str {
		"file"
	}

	#[tracing::instrument(skip(self), fields(path = %self.path.display()))]
	async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
		let text = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|e| self.io_error(e))?;
		let lines: Vec<PolicyLine> = text.lines().filter_map(PolicyLine::parse_csv).collect();
		tracing::debug!(rules = lines.len(), "policy file loaded");
		Ok(lines)
	}

	#[tracing::instrument(skip(self, lines), fields(path = %self.path.display(), rules = lines.len()))]
	async fn save_policy(&self, lines: &[PolicyLine]) -> Result<(), AdapterError> {
		let mut body = String::new();
		for line in lines {
			body.push_str(&line.to_csv());
			body.push('\n');
		}

		let staging = self.path.with_extension("csv.tmp");
		tokio::fs::write(&staging, body)
			.await
			.map_err(|e| self.io_error(e))?;
		tokio::fs::rename(&staging, &self.path)
			.await
			.map_err(|e| self.io_error(e))?;
		Ok(())
	}
}
