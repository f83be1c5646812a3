//! Index writer: per-collection upsert and removal
//!
//! One upsert computes the score for every (scope, field, direction)
//! combination and writes the sorted entries, the summary, the preview
//! cache entry and the state record in a single pipelined batch. Scope
//! moves (library or kind changed) are detected against the previous
//! summary and stale entries are removed before the new ones are added, so
//! a collection is never visible under two libraries at once.

use super::{
	preview::{PreviewCache, PreviewSource},
	state::{IndexState, StateTracker},
};
use crate::{
	config::IndexConfig,
	domain::{
		ordering::{score_for, Scope},
		Collection, CollectionKind, CollectionSummary, SortDirection, SortField,
	},
	error::Result,
	infrastructure::store::{KeySpace, SortedSetStore, WriteBatch},
};
use std::{collections::HashMap, sync::Arc};
use strum::IntoEnumIterator;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Outcome of comparing a collection against its previously indexed scopes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScopeChange {
	Unchanged,
	Moved {
		old_library: Option<Uuid>,
		old_kind: Option<CollectionKind>,
	},
}

impl ScopeChange {
	/// Compare the previous summary (if any) against the incoming record
	pub fn detect(previous: Option<&CollectionSummary>, next: &Collection) -> Self {
		let Some(previous) = previous else {
			return Self::Unchanged;
		};
		let old_library = (previous.library_id != next.library_id).then_some(previous.library_id);
		let old_kind = (previous.kind != next.kind).then_some(previous.kind);
		if old_library.is_none() && old_kind.is_none() {
			Self::Unchanged
		} else {
			Self::Moved {
				old_library,
				old_kind,
			}
		}
	}
}

/// Per-collection keyed locks; writes to one collection are serialized,
/// writes to different collections run in parallel
#[derive(Default)]
struct EntityLocks {
	inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl EntityLocks {
	async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
		let lock = {
			let mut map = self.inner.lock().await;
			// Drop entries nobody is holding so the map stays bounded by
			// the number of concurrent writers
			map.retain(|_, l| Arc::strong_count(l) > 1);
			map.entry(id).or_default().clone()
		};
		lock.lock_owned().await
	}
}

/// Writes and removes collections in the sorted index
pub struct IndexWriter {
	store: Arc<dyn SortedSetStore>,
	keys: KeySpace,
	tracker: StateTracker,
	previews: PreviewCache,
	locks: EntityLocks,
}

impl IndexWriter {
	pub fn new(
		store: Arc<dyn SortedSetStore>,
		config: &IndexConfig,
		preview_source: Option<Arc<dyn PreviewSource>>,
	) -> Self {
		let keys = KeySpace::new(&config.key_prefix);
		Self {
			tracker: StateTracker::new(store.clone(), keys.clone()),
			previews: PreviewCache::new(preview_source, config.max_cached_preview_bytes),
			store,
			keys,
			locks: EntityLocks::default(),
		}
	}

	pub(crate) async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
		self.locks.acquire(id).await
	}

	/// Index or re-index one collection in a single batched round trip.
	/// Soft-deleted collections are never indexed; upserting one removes it.
	pub async fn upsert(&self, collection: &Collection) -> Result<()> {
		if collection.is_deleted() {
			return self.remove(collection.id).await;
		}
		let _guard = self.lock(collection.id).await;
		let previous = self.previous_summary(collection.id).await?;
		let mut batch = WriteBatch::default();
		self.stage(collection, previous.as_ref(), &mut batch, false)
			.await?;
		Ok(self.store.apply(batch).await?)
	}

	/// Fetch and decode the previously written summary, if any
	pub(crate) async fn previous_summary(&self, id: Uuid) -> Result<Option<CollectionSummary>> {
		Ok(self
			.store
			.hget(&self.keys.summaries(), &id.to_string())
			.await?
			.and_then(|bytes| CollectionSummary::decode_lossy(&bytes)))
	}

	/// Queue every write for one collection into `batch`: stale-scope
	/// removals first, then sorted entries for all scopes, the summary, the
	/// preview bytes and the state record. Returns an estimate of the bytes
	/// staged, used for peak-memory accounting during bulk rebuilds.
	pub(crate) async fn stage(
		&self,
		collection: &Collection,
		previous: Option<&CollectionSummary>,
		batch: &mut WriteBatch,
		skip_preview_caching: bool,
	) -> Result<u64> {
		let member = collection.id.to_string();

		match ScopeChange::detect(previous, collection) {
			ScopeChange::Unchanged => {}
			ScopeChange::Moved {
				old_library,
				old_kind,
			} => {
				debug!(
					collection_id = %collection.id,
					?old_library,
					?old_kind,
					"collection moved scopes, removing stale entries"
				);
				let stale: Vec<Scope> = old_library
					.map(Scope::Library)
					.into_iter()
					.chain(old_kind.map(Scope::Kind))
					.collect();
				for scope in &stale {
					for field in SortField::iter() {
						for direction in SortDirection::iter() {
							batch.zrem(self.keys.sorted(scope, field, direction), member.clone());
						}
					}
				}
			}
		}

		for scope in Scope::of(collection) {
			for field in SortField::iter() {
				for direction in SortDirection::iter() {
					batch.zadd(
						self.keys.sorted(&scope, field, direction),
						member.clone(),
						score_for(collection, field, direction),
					);
				}
			}
		}

		let summary = CollectionSummary::from_collection(collection).encode()?;
		let mut staged_bytes = summary.len() as u64;
		batch.hset(self.keys.summaries(), member, summary);

		staged_bytes += self
			.previews
			.stage(batch, &self.keys, collection, skip_preview_caching)
			.await?;

		self.tracker
			.stage_put(batch, &IndexState::capture(collection))?;
		Ok(staged_bytes)
	}

	/// Remove a collection from every index it appears in, plus its
	/// summary, cached preview bytes and state record
	pub async fn remove(&self, id: Uuid) -> Result<()> {
		let _guard = self.lock(id).await;
		let member = id.to_string();
		let mut batch = WriteBatch::default();

		match self.previous_summary(id).await? {
			Some(summary) => {
				for scope in summary.scopes() {
					for field in SortField::iter() {
						for direction in SortDirection::iter() {
							batch.zrem(self.keys.sorted(&scope, field, direction), member.clone());
						}
					}
				}
			}
			None => {
				// Summary lost or undecodable; the global scope is still
				// the one place the collection is guaranteed to appear
				for field in SortField::iter() {
					for direction in SortDirection::iter() {
						batch.zrem(
							self.keys.sorted(&Scope::Global, field, direction),
							member.clone(),
						);
					}
				}
			}
		}

		batch.hdel(self.keys.summaries(), member.clone());
		batch.hdel(self.keys.previews(), member);
		batch.del(self.keys.state(id));
		Ok(self.store.apply(batch).await?)
	}
}
