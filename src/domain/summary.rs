//! Compact collection summary cached in the index for fast batch reads

use super::{
	collection::{Collection, CollectionKind},
	ordering::Scope,
};
use crate::error::IndexError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Bumped whenever the persisted summary or state layout changes; records
/// written under an older version are treated as absent and re-indexed.
pub const SUMMARY_SCHEMA_VERSION: u32 = 2;

/// The fixed-shape projection of a collection stored as a MessagePack hash
/// value, keyed by collection id.
///
/// Invariant: a summary exists if and only if the collection is present in
/// at least one sorted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
	pub id: Uuid,
	pub library_id: Uuid,
	pub kind: CollectionKind,
	pub name: String,
	pub item_count: u32,
	pub preview_count: u32,
	pub derived_count: u32,
	pub total_size_bytes: u64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub first_preview_path: Option<String>,
	pub first_preview_id: Option<Uuid>,
	pub schema_version: u32,
}

impl CollectionSummary {
	pub fn from_collection(collection: &Collection) -> Self {
		let first = collection.first_preview();
		Self {
			id: collection.id,
			library_id: collection.library_id,
			kind: collection.kind,
			name: collection.name.clone(),
			item_count: collection.item_count,
			preview_count: collection.preview_count,
			derived_count: collection.derived_count,
			total_size_bytes: collection.total_size_bytes,
			created_at: collection.created_at,
			updated_at: collection.updated_at,
			first_preview_path: first.map(|a| a.path.clone()),
			first_preview_id: first.map(|a| a.id),
			schema_version: SUMMARY_SCHEMA_VERSION,
		}
	}

	pub fn encode(&self) -> Result<Vec<u8>, IndexError> {
		rmp_serde::to_vec_named(self).map_err(|e| IndexError::Serialization(e.to_string()))
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
		let summary: Self =
			rmp_serde::from_slice(bytes).map_err(|e| IndexError::Serialization(e.to_string()))?;
		if summary.schema_version != SUMMARY_SCHEMA_VERSION {
			return Err(IndexError::Serialization(format!(
				"summary schema version {} does not match current {}",
				summary.schema_version, SUMMARY_SCHEMA_VERSION
			)));
		}
		Ok(summary)
	}

	/// Decode, treating schema drift or corruption as "absent". Forces a
	/// rebuild for the affected collection instead of failing the caller.
	pub fn decode_lossy(bytes: &[u8]) -> Option<Self> {
		match Self::decode(bytes) {
			Ok(summary) => Some(summary),
			Err(e) => {
				warn!("discarding undecodable summary record: {e}");
				None
			}
		}
	}

	/// Every scope this summary says the collection is indexed under
	pub fn scopes(&self) -> [Scope; 3] {
		[
			Scope::Global,
			Scope::Library(self.library_id),
			Scope::Kind(self.kind),
		]
	}
}
