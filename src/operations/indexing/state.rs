//! Per-collection index state, used only for change detection
//!
//! One record per indexed collection, persisted independently of the sorted
//! entries. Never consulted on the read path.

use crate::{
	domain::{summary::SUMMARY_SCHEMA_VERSION, Collection},
	error::{IndexError, Result},
	infrastructure::store::{KeySpace, SortedSetStore, WriteBatch},
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Bookkeeping record written every time a collection is (re)indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
	pub collection_id: Uuid,
	/// When the index write happened
	pub indexed_at: DateTime<Utc>,
	/// The collection's `updated_at` as observed at index time; the cheap
	/// "has this changed?" comparison point
	pub source_updated_at: DateTime<Utc>,
	pub item_count: u32,
	pub preview_count: u32,
	pub derived_count: u32,
	pub has_first_preview: bool,
	pub first_preview_path: Option<String>,
	pub schema_version: u32,
}

impl IndexState {
	/// Capture the state a fresh index write should record
	pub fn capture(collection: &Collection) -> Self {
		let first = collection.first_preview();
		Self {
			collection_id: collection.id,
			indexed_at: Utc::now(),
			source_updated_at: collection.updated_at,
			item_count: collection.item_count,
			preview_count: collection.preview_count,
			derived_count: collection.derived_count,
			has_first_preview: first.is_some(),
			first_preview_path: first.map(|a| a.path.clone()),
			schema_version: SUMMARY_SCHEMA_VERSION,
		}
	}

	/// True when the collection changed after this state was recorded
	pub fn is_stale(&self, collection: &Collection) -> bool {
		collection.updated_at > self.source_updated_at
			|| self.schema_version != SUMMARY_SCHEMA_VERSION
	}

	/// True when the collection gained a preview asset this state predates
	pub fn missing_first_preview(&self, collection: &Collection) -> bool {
		collection.first_preview().is_some() && !self.has_first_preview
	}

	pub fn encode(&self) -> Result<Vec<u8>> {
		rmp_serde::to_vec_named(self).map_err(|e| IndexError::Serialization(e.to_string()))
	}
}

/// Persists and enumerates [`IndexState`] records
#[derive(Clone)]
pub struct StateTracker {
	store: Arc<dyn SortedSetStore>,
	keys: KeySpace,
}

impl StateTracker {
	pub fn new(store: Arc<dyn SortedSetStore>, keys: KeySpace) -> Self {
		Self { store, keys }
	}

	/// Fetch a collection's state; undecodable records are logged and
	/// reported absent so the collection gets re-indexed
	pub async fn get(&self, id: Uuid) -> Result<Option<IndexState>> {
		let Some(bytes) = self.store.get(&self.keys.state(id)).await? else {
			return Ok(None);
		};
		match rmp_serde::from_slice::<IndexState>(&bytes) {
			Ok(state) => Ok(Some(state)),
			Err(e) => {
				warn!(collection_id = %id, "discarding undecodable index state: {e}");
				Ok(None)
			}
		}
	}

	pub async fn put(&self, state: &IndexState) -> Result<()> {
		let mut batch = WriteBatch::default();
		self.stage_put(&mut batch, state)?;
		Ok(self.store.apply(batch).await?)
	}

	/// Queue a state write into an existing batch
	pub fn stage_put(&self, batch: &mut WriteBatch, state: &IndexState) -> Result<()> {
		batch.set(self.keys.state(state.collection_id), state.encode()?);
		Ok(())
	}

	pub async fn delete(&self, id: Uuid) -> Result<()> {
		Ok(self.store.del(&self.keys.state(id)).await?)
	}

	/// Every collection id with a state record, via key-pattern scan.
	/// Non-blocking and safe to run concurrently with writes.
	pub fn list_tracked_ids(&self) -> impl Stream<Item = Result<Uuid>> + '_ {
		async_stream::try_stream! {
			let keys = self.store.scan_keys(&self.keys.state_pattern()).await?;
			for key in keys {
				if let Some(id) = self.keys.id_from_state_key(&key) {
					yield id;
				} else {
					warn!(key, "skipping malformed state key");
				}
			}
		}
	}
}
