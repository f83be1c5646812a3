//! Read-path query façade
//!
//! Pagination, rank navigation and sibling queries composed from store
//! primitives. Callers hydrate full collections from the primary store only
//! for the ids on the page being displayed. When the store is unreachable
//! the façade serves the same queries from the primary store directly:
//! slower, but the ordering contract still holds.

use crate::{
	domain::{
		ordering::{compare_like_index, Scope},
		Collection, CollectionSummary, SortDirection, SortField,
	},
	error::Result,
	infrastructure::{
		store::{KeySpace, SortedSetStore},
		PrimaryStore,
	},
	operations::indexing::IndexWriter,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// One page of an ordered listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionPage {
	pub ids: Vec<Uuid>,
	pub total: u64,
}

/// Previous/next neighbours of a collection within an ordering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Navigation {
	pub previous_id: Option<Uuid>,
	pub next_id: Option<Uuid>,
	/// 1-based position within the ordering
	pub position: u64,
	pub total: u64,
}

/// A page of an ordering plus the queried collection's own position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Siblings {
	pub ids: Vec<Uuid>,
	pub current_position: u64,
	pub total: u64,
}

/// Stateless read-path service; safe to share and call concurrently
pub struct QueryService {
	store: Arc<dyn SortedSetStore>,
	primary: Arc<dyn PrimaryStore>,
	writer: Arc<IndexWriter>,
	keys: KeySpace,
	scan_page_size: u64,
}

impl QueryService {
	pub fn new(
		store: Arc<dyn SortedSetStore>,
		primary: Arc<dyn PrimaryStore>,
		writer: Arc<IndexWriter>,
		keys: KeySpace,
		scan_page_size: u64,
	) -> Self {
		Self {
			store,
			primary,
			writer,
			keys,
			scan_page_size,
		}
	}

	/// Fetch one page of ids in the requested order. `page` is 1-based.
	pub async fn page(
		&self,
		scope: Scope,
		field: SortField,
		direction: SortDirection,
		page: u64,
		page_size: u64,
	) -> Result<CollectionPage> {
		match self.page_indexed(&scope, field, direction, page, page_size).await {
			Err(e) if e.is_store_unavailable() => {
				warn!("store unavailable, serving page from primary store: {e}");
				let ordered = self.fallback_ordering(&scope, field, direction).await?;
				let start = page.max(1).saturating_sub(1) * page_size;
				Ok(CollectionPage {
					total: ordered.len() as u64,
					ids: ordered
						.iter()
						.skip(start as usize)
						.take(page_size as usize)
						.map(|c| c.id)
						.collect(),
				})
			}
			other => other,
		}
	}

	/// Previous/next ids around a collection, with its 1-based position.
	/// Returns `None` when the collection exists in neither the index nor
	/// the primary store.
	pub async fn navigation(
		&self,
		id: Uuid,
		scope: Scope,
		field: SortField,
		direction: SortDirection,
	) -> Result<Option<Navigation>> {
		match self.navigation_indexed(id, &scope, field, direction).await {
			Err(e) if e.is_store_unavailable() => {
				warn!("store unavailable, serving navigation from primary store: {e}");
				let ordered = self.fallback_ordering(&scope, field, direction).await?;
				let Some(rank) = ordered.iter().position(|c| c.id == id) else {
					return Ok(None);
				};
				Ok(Some(Navigation {
					previous_id: rank.checked_sub(1).map(|r| ordered[r].id),
					next_id: ordered.get(rank + 1).map(|c| c.id),
					position: rank as u64 + 1,
					total: ordered.len() as u64,
				}))
			}
			other => other,
		}
	}

	/// A page of the ordering plus the queried collection's position. The
	/// page is page-relative, not centered on the collection.
	pub async fn siblings(
		&self,
		id: Uuid,
		scope: Scope,
		field: SortField,
		direction: SortDirection,
		page: u64,
		page_size: u64,
	) -> Result<Option<Siblings>> {
		let key = self.keys.sorted(&scope, field, direction);
		match self.rank_or_heal(&key, id).await {
			Err(e) if e.is_store_unavailable() => {
				warn!("store unavailable, serving siblings from primary store: {e}");
				let ordered = self.fallback_ordering(&scope, field, direction).await?;
				let Some(rank) = ordered.iter().position(|c| c.id == id) else {
					return Ok(None);
				};
				let start = page.max(1).saturating_sub(1) * page_size;
				Ok(Some(Siblings {
					ids: ordered
						.iter()
						.skip(start as usize)
						.take(page_size as usize)
						.map(|c| c.id)
						.collect(),
					current_position: rank as u64 + 1,
					total: ordered.len() as u64,
				}))
			}
			Ok(None) => Ok(None),
			Ok(Some(rank)) => {
				let listing = self
					.page_indexed(&scope, field, direction, page, page_size)
					.await?;
				Ok(Some(Siblings {
					ids: listing.ids,
					current_position: rank + 1,
					total: listing.total,
				}))
			}
			Err(e) => Err(e),
		}
	}

	/// Batched summary hydration for a page of ids, one slot per id
	pub async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<Option<CollectionSummary>>> {
		if ids.is_empty() {
			return Ok(vec![]);
		}
		let fields: Vec<String> = ids.iter().map(Uuid::to_string).collect();
		let raw = self.store.hmget(&self.keys.summaries(), &fields).await?;
		Ok(raw
			.into_iter()
			.map(|bytes| bytes.as_deref().and_then(CollectionSummary::decode_lossy))
			.collect())
	}

	async fn page_indexed(
		&self,
		scope: &Scope,
		field: SortField,
		direction: SortDirection,
		page: u64,
		page_size: u64,
	) -> Result<CollectionPage> {
		let key = self.keys.sorted(scope, field, direction);
		if page_size == 0 {
			return Ok(CollectionPage {
				ids: vec![],
				total: self.store.zcard(&key).await?,
			});
		}
		let start = page.max(1).saturating_sub(1) * page_size;
		let stop = (start + page_size).saturating_sub(1);
		let members = self.store.zrange(&key, start as i64, stop as i64).await?;
		let total = self.store.zcard(&key).await?;
		Ok(CollectionPage {
			ids: parse_members(members),
			total,
		})
	}

	async fn navigation_indexed(
		&self,
		id: Uuid,
		scope: &Scope,
		field: SortField,
		direction: SortDirection,
	) -> Result<Option<Navigation>> {
		let key = self.keys.sorted(scope, field, direction);
		let Some(rank) = self.rank_or_heal(&key, id).await? else {
			return Ok(None);
		};
		let total = self.store.zcard(&key).await?;
		let previous_id = if rank > 0 {
			let r = (rank - 1) as i64;
			parse_members(self.store.zrange(&key, r, r).await?).first().copied()
		} else {
			None
		};
		let next_id = if rank + 1 < total {
			let r = (rank + 1) as i64;
			parse_members(self.store.zrange(&key, r, r).await?).first().copied()
		} else {
			None
		};
		Ok(Some(Navigation {
			previous_id,
			next_id,
			position: rank + 1,
			total,
		}))
	}

	/// Rank lookup with self-healing: a collection that exists in the
	/// primary store but is missing from the index is re-indexed and the
	/// lookup retried once before reporting absence.
	async fn rank_or_heal(&self, key: &str, id: Uuid) -> Result<Option<u64>> {
		if let Some(rank) = self.store.zrank(key, &id.to_string()).await? {
			return Ok(Some(rank));
		}
		let collection = self
			.primary
			.get_by_id(id)
			.await
			.map_err(crate::error::IndexError::primary)?;
		let Some(collection) = collection.filter(|c| !c.is_deleted()) else {
			return Ok(None);
		};
		warn!(collection_id = %id, "collection missing from index, self-healing");
		self.writer.upsert(&collection).await?;
		Ok(self.store.zrank(key, &id.to_string()).await?)
	}

	/// Degraded path: rebuild the requested ordering from the primary
	/// store. Same comparator as the index scores, so results match what
	/// the sorted sets would have returned.
	async fn fallback_ordering(
		&self,
		scope: &Scope,
		field: SortField,
		direction: SortDirection,
	) -> Result<Vec<Collection>> {
		let mut all = Vec::new();
		let mut skip = 0u64;
		loop {
			let page = self
				.primary
				.page_active(skip, self.scan_page_size)
				.await
				.map_err(crate::error::IndexError::primary)?;
			if page.is_empty() {
				break;
			}
			skip += page.len() as u64;
			all.extend(page.into_iter().filter(|c| scope_contains(scope, c)));
		}
		all.sort_by(|a, b| compare_like_index(a, b, field, direction));
		Ok(all)
	}
}

fn scope_contains(scope: &Scope, collection: &Collection) -> bool {
	match scope {
		Scope::Global => true,
		Scope::Library(id) => collection.library_id == *id,
		Scope::Kind(kind) => collection.kind == *kind,
	}
}

fn parse_members(members: Vec<String>) -> Vec<Uuid> {
	members
		.into_iter()
		.filter_map(|m| match Uuid::parse_str(&m) {
			Ok(id) => Some(id),
			Err(_) => {
				warn!(member = %m, "ignoring non-uuid sorted-set member");
				None
			}
		})
		.collect()
}
