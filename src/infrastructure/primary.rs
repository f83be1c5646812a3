//! Primary document-store collaborator
//!
//! The engine consumes this interface to enumerate and hydrate collections.
//! It never mutates the primary store.

use crate::domain::Collection;
use async_trait::async_trait;
use uuid::Uuid;

/// Read-only access to the primary document store
#[async_trait]
pub trait PrimaryStore: Send + Sync {
	/// Number of live (not soft-deleted) collections
	async fn count_active(&self) -> anyhow::Result<u64>;

	/// One page of live collections, ordered by id ascending so paging is
	/// stable under concurrent writes
	async fn page_active(&self, skip: u64, limit: u64) -> anyhow::Result<Vec<Collection>>;

	/// Fetch by id, including soft-deleted records (the verifier needs to
	/// distinguish "deleted" from "never existed")
	async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Collection>>;

	/// Batched fetch, including soft-deleted records; absent ids are simply
	/// missing from the result
	async fn get_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Collection>>;
}
