// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::error::ConfigError;

/// Number of positional slots (`V0..V10`) an attribute bundle may occupy.
pub const DEFAULT_SLOT_WIDTH: usize = 11;
pub const MAX_SLOT_WIDTH: usize = 64;

#[derive(Debug, Clone)]
pub struct AbacConfig {
	pub slot_width: usize,
}

impl Default for AbacConfig {
	fn default() -> Self {
		Self {
			slot_width: DEFAULT_SLOT_WIDTH,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AbacConfigLayer {
	#[serde(default)]
	pub slot_width: Option<usize>,
}

impl AbacConfigLayer {
	pub fn merge(&mut self, other: AbacConfigLayer) {
		if other.slot_width.is_some() {
			self.slot_width = other.slot_width;
		}
	}

	pub fn finalize(self) -> Result<AbacConfig, ConfigError> {
		let slot_width = self.slot_width.unwrap_or(DEFAULT_SLOT_WIDTH);
		if !(1..=MAX_SLOT_WIDTH).contains(&slot_width) {
			return Err(ConfigError::InvalidValue {
				key: "abac.slot_width".to_string(),
				message: format!("must be between 1 and {MAX_SLOT_WIDTH}, got {slot_width}"),
			});
		}
		Ok(AbacConfig { slot_width })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_width_is_eleven() {
		assert_eq!(AbacConfigLayer::default().finalize().unwrap().slot_width, 11);
	}

	#[test]
	fn zero_width_is_rejected() {
		let layer = AbacConfigLayer {
			slot_width: Some(0),
		};
		assert!(matches!(
			layer.finalize(),
			Err(ConfigError::InvalidValue { .. })
		));
	}
}
