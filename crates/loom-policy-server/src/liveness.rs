// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Liveness marker file for external probes.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Exists on disk while the server is accepting requests.
#[derive(Debug)]
pub struct LivenessFile {
	path: PathBuf,
}

impl LivenessFile {
	pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
		let path = path.into();
		std::fs::File::create(&path)?;
		debug!(path = %path.display(), "liveness file created");
		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Deletes the marker. A marker already removed by someone else is not an error.
	pub fn remove(self) -> io::Result<()> {
		match std::fs::remove_file(&self.path) {
			Ok(()) => {
				debug!(path = %self.path.display(), "liveness file removed");
				Ok(())
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				warn!(path = %self.path.display(), "liveness file already gone");
				Ok(())
			}
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_and_remove() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("app_server_live");

		let marker = LivenessFile::create(&path).unwrap();
		assert!(path.exists());
		assert_eq!(marker.path(), path);

		marker.remove().unwrap();
		assert!(!path.exists());
	}

	#[test]
	fn removing_a_missing_marker_is_fine() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("app_server_live");
		let marker = LivenessFile::create(&path).unwrap();
		std::fs::remove_file(&path).unwrap();
		assert!(marker.remove().is_ok());
	}

	#[test]
	fn unwritable_location_fails() {
		assert!(LivenessFile::create("/nonexistent-dir/app_server_live").is_err());
	}
}
