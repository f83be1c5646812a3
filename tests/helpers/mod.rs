//! Shared fixtures: an in-memory primary store and collection builders

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use collection_index::{
	Collection, CollectionIndex, CollectionKind, IndexConfig, MemoryStore, PreviewAsset,
	PreviewSource, PrimaryStore, SortedSetStore,
};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Fixed reference instant so tests control every timestamp
pub fn base_time() -> DateTime<Utc> {
	Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// In-memory stand-in for the primary document store
#[derive(Default)]
pub struct MemoryPrimary {
	rows: RwLock<BTreeMap<Uuid, Collection>>,
}

impl MemoryPrimary {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn insert(&self, collection: Collection) {
		self.rows.write().await.insert(collection.id, collection);
	}

	/// Overwrite a row and advance its `updated_at`
	pub async fn touch(&self, id: Uuid, updated_at: DateTime<Utc>) {
		let mut rows = self.rows.write().await;
		if let Some(row) = rows.get_mut(&id) {
			row.updated_at = updated_at;
		}
	}

	pub async fn set_library(&self, id: Uuid, library_id: Uuid, updated_at: DateTime<Utc>) {
		let mut rows = self.rows.write().await;
		if let Some(row) = rows.get_mut(&id) {
			row.library_id = library_id;
			row.updated_at = updated_at;
		}
	}

	pub async fn add_preview(&self, id: Uuid, asset: PreviewAsset) {
		let mut rows = self.rows.write().await;
		if let Some(row) = rows.get_mut(&id) {
			row.preview_assets.push(asset);
			row.preview_count += 1;
		}
	}

	pub async fn clear_previews(&self, id: Uuid) {
		let mut rows = self.rows.write().await;
		if let Some(row) = rows.get_mut(&id) {
			row.preview_assets.clear();
			row.preview_count = 0;
		}
	}

	pub async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) {
		let mut rows = self.rows.write().await;
		if let Some(row) = rows.get_mut(&id) {
			row.deleted_at = Some(at);
		}
	}

	pub async fn hard_delete(&self, id: Uuid) {
		self.rows.write().await.remove(&id);
	}

	pub async fn get(&self, id: Uuid) -> Option<Collection> {
		self.rows.read().await.get(&id).cloned()
	}
}

#[async_trait]
impl PrimaryStore for MemoryPrimary {
	async fn count_active(&self) -> anyhow::Result<u64> {
		let rows = self.rows.read().await;
		Ok(rows.values().filter(|c| !c.is_deleted()).count() as u64)
	}

	async fn page_active(&self, skip: u64, limit: u64) -> anyhow::Result<Vec<Collection>> {
		let rows = self.rows.read().await;
		Ok(rows
			.values()
			.filter(|c| !c.is_deleted())
			.skip(skip as usize)
			.take(limit as usize)
			.cloned()
			.collect())
	}

	async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Collection>> {
		Ok(self.rows.read().await.get(&id).cloned())
	}

	async fn get_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Collection>> {
		let rows = self.rows.read().await;
		Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
	}
}

/// Fluent collection builder with deterministic timestamps
pub struct CollectionBuilder {
	inner: Collection,
}

pub fn collection(name: &str) -> CollectionBuilder {
	CollectionBuilder {
		inner: Collection {
			id: Uuid::new_v4(),
			library_id: Uuid::nil(),
			kind: CollectionKind::Album,
			name: name.to_string(),
			created_at: base_time(),
			updated_at: base_time(),
			item_count: 0,
			preview_count: 0,
			derived_count: 0,
			total_size_bytes: 0,
			preview_assets: vec![],
			deleted_at: None,
		},
	}
}

impl CollectionBuilder {
	pub fn library(mut self, id: Uuid) -> Self {
		self.inner.library_id = id;
		self
	}

	pub fn kind(mut self, kind: CollectionKind) -> Self {
		self.inner.kind = kind;
		self
	}

	pub fn created_offset(mut self, seconds: i64) -> Self {
		self.inner.created_at = base_time() + Duration::seconds(seconds);
		self
	}

	pub fn updated_offset(mut self, seconds: i64) -> Self {
		self.inner.updated_at = base_time() + Duration::seconds(seconds);
		self
	}

	pub fn items(mut self, count: u32) -> Self {
		self.inner.item_count = count;
		self
	}

	pub fn size(mut self, bytes: u64) -> Self {
		self.inner.total_size_bytes = bytes;
		self
	}

	pub fn preview(mut self, path: &str, size_bytes: u64) -> Self {
		self.inner.preview_assets.push(PreviewAsset {
			id: Uuid::new_v4(),
			path: path.to_string(),
			size_bytes,
		});
		self.inner.preview_count += 1;
		self
	}

	pub fn build(self) -> Collection {
		self.inner
	}
}

/// A fully wired engine over in-memory stores
pub struct TestEngine {
	pub index: CollectionIndex,
	pub store: Arc<MemoryStore>,
	pub primary: Arc<MemoryPrimary>,
}

pub fn engine() -> TestEngine {
	engine_with_config(IndexConfig::default())
}

pub fn engine_with_config(config: IndexConfig) -> TestEngine {
	let store = Arc::new(MemoryStore::new());
	let primary = Arc::new(MemoryPrimary::new());
	let index = CollectionIndex::new(
		primary.clone() as Arc<dyn PrimaryStore>,
		store.clone() as Arc<dyn SortedSetStore>,
		config,
	);
	TestEngine {
		index,
		store,
		primary,
	}
}

/// An engine with preview-asset byte caching wired to `source`
pub fn engine_with_previews(config: IndexConfig, source: Arc<dyn PreviewSource>) -> TestEngine {
	let store = Arc::new(MemoryStore::new());
	let primary = Arc::new(MemoryPrimary::new());
	let index = CollectionIndex::with_preview_source(
		primary.clone() as Arc<dyn PrimaryStore>,
		store.clone() as Arc<dyn SortedSetStore>,
		config,
		source,
	);
	TestEngine {
		index,
		store,
		primary,
	}
}
