//! Preview-asset byte caching
//!
//! Optionally caches the cover asset's bytes next to the summaries so list
//! screens can serve covers without touching the filesystem. Large assets
//! are skipped outright rather than held in multiple transient copies.

use crate::{
	domain::{Collection, PreviewAsset},
	error::Result,
	infrastructure::store::{KeySpace, WriteBatch},
};
use async_trait::async_trait;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, warn};

/// Loads preview-asset bytes from wherever they live
#[async_trait]
pub trait PreviewSource: Send + Sync {
	/// Returns `None` when the asset cannot be found; errors are reserved
	/// for real I/O failures
	async fn load(&self, asset: &PreviewAsset) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Reads preview assets from a directory root
pub struct FilePreviewSource {
	root: PathBuf,
}

impl FilePreviewSource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

#[async_trait]
impl PreviewSource for FilePreviewSource {
	async fn load(&self, asset: &PreviewAsset) -> anyhow::Result<Option<Vec<u8>>> {
		let path = self.root.join(&asset.path);
		match tokio::fs::read(&path).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}
}

/// Caching policy wrapper used by the index writer
pub(crate) struct PreviewCache {
	source: Option<Arc<dyn PreviewSource>>,
	max_bytes: u64,
}

impl PreviewCache {
	pub fn new(source: Option<Arc<dyn PreviewSource>>, max_bytes: u64) -> Self {
		Self { source, max_bytes }
	}

	/// Queue the cover bytes for `collection` into `batch`, returning the
	/// number of bytes staged. A load failure is logged and skipped; it
	/// never fails the surrounding index write.
	pub async fn stage(
		&self,
		batch: &mut WriteBatch,
		keys: &KeySpace,
		collection: &Collection,
		skip: bool,
	) -> Result<u64> {
		let Some(source) = &self.source else {
			return Ok(0);
		};
		let Some(asset) = collection.first_preview() else {
			// No cover; drop any bytes cached for a previous one
			batch.hdel(keys.previews(), collection.id.to_string());
			return Ok(0);
		};
		if skip {
			return Ok(0);
		}
		if asset.size_bytes > self.max_bytes {
			debug!(
				collection_id = %collection.id,
				size = asset.size_bytes,
				"preview asset above cache threshold, skipping"
			);
			return Ok(0);
		}
		match source.load(asset).await {
			Ok(Some(bytes)) => {
				let staged = bytes.len() as u64;
				batch.hset(keys.previews(), collection.id.to_string(), bytes);
				Ok(staged)
			}
			Ok(None) => Ok(0),
			Err(e) => {
				warn!(collection_id = %collection.id, "failed to load preview asset: {e}");
				Ok(0)
			}
		}
	}
}
