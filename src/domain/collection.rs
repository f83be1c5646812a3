//! Collection entity as consumed from the primary store
//!
//! The index engine treats collections as read-only input; it never writes
//! back to the primary store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind tag for a collection, used as a secondary index scope
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
	strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CollectionKind {
	/// User-curated album
	Album,
	/// Mirror of a filesystem folder
	Folder,
	/// Rule-driven smart collection
	Smart,
}

/// A preview asset attached to a collection (ordered; first entry is the cover)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewAsset {
	pub id: Uuid,
	pub path: String,
	pub size_bytes: u64,
}

/// A collection record hydrated from the primary store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
	pub id: Uuid,
	/// Owning library; collections are partitioned per library
	pub library_id: Uuid,
	pub kind: CollectionKind,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub item_count: u32,
	pub preview_count: u32,
	/// Count of derived assets (thumbnails etc.) cached for this collection
	pub derived_count: u32,
	pub total_size_bytes: u64,
	pub preview_assets: Vec<PreviewAsset>,
	/// Soft-delete marker; deleted collections are never indexed
	pub deleted_at: Option<DateTime<Utc>>,
}

impl Collection {
	/// The cover asset, if any
	pub fn first_preview(&self) -> Option<&PreviewAsset> {
		self.preview_assets.first()
	}

	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}
}
