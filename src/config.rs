//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tuning knobs for the index engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
	/// Prefix for every key the engine writes
	pub key_prefix: String,

	/// Page size used when enumerating the primary store during rebuilds
	/// and verification
	pub scan_page_size: u64,

	/// Number of collections written per pipelined batch during bulk
	/// rebuilds. Bounds both in-flight store operations and peak resident
	/// memory of per-collection buffers.
	pub rebuild_batch_size: usize,

	/// Preview assets above this size are never cached in the index; large
	/// buffers are served from their source instead of being held in
	/// multiple transient copies.
	pub max_cached_preview_bytes: u64,
}

impl IndexConfig {
	/// A zero page or batch size would stall the paging loops; clamp both
	/// to at least one
	pub fn sanitized(mut self) -> Self {
		self.scan_page_size = self.scan_page_size.max(1);
		self.rebuild_batch_size = self.rebuild_batch_size.max(1);
		self
	}
}

impl Default for IndexConfig {
	fn default() -> Self {
		Self {
			key_prefix: "cidx".to_string(),
			scan_page_size: 500,
			rebuild_batch_size: 200,
			max_cached_preview_bytes: 1024 * 1024,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sanitized_clamps_zero_sizes() {
		let config = IndexConfig {
			scan_page_size: 0,
			rebuild_batch_size: 0,
			..Default::default()
		}
		.sanitized();
		assert_eq!(config.scan_page_size, 1);
		assert_eq!(config.rebuild_batch_size, 1);

		let untouched = IndexConfig::default().sanitized();
		assert_eq!(untouched.scan_page_size, 500);
		assert_eq!(untouched.rebuild_batch_size, 200);
	}
}
