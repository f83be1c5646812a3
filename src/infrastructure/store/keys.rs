//! Persisted key layout
//!
//! One sorted set per `(scope, field, direction)` combination, one summary
//! hash, one preview-bytes hash, one state key per collection, and two
//! singleton metadata keys used by the lightweight validity check.

use crate::domain::{Scope, SortDirection, SortField};
use uuid::Uuid;

/// Builds every key the engine reads or writes
#[derive(Debug, Clone)]
pub struct KeySpace {
	prefix: String,
}

impl KeySpace {
	pub fn new(prefix: &str) -> Self {
		Self {
			prefix: prefix.to_string(),
		}
	}

	/// Sorted set holding one scope's order for one field/direction
	pub fn sorted(&self, scope: &Scope, field: SortField, direction: SortDirection) -> String {
		format!(
			"{}:sort:{}:{}:{}",
			self.prefix,
			scope.segment(),
			field,
			direction
		)
	}

	/// Hash of collection id -> MessagePack summary
	pub fn summaries(&self) -> String {
		format!("{}:summary", self.prefix)
	}

	/// Hash of collection id -> cached first-preview bytes
	pub fn previews(&self) -> String {
		format!("{}:preview", self.prefix)
	}

	/// Per-collection index state key
	pub fn state(&self, id: Uuid) -> String {
		format!("{}:state:{id}", self.prefix)
	}

	/// Scan pattern covering the whole state keyspace
	pub fn state_pattern(&self) -> String {
		format!("{}:state:*", self.prefix)
	}

	/// Scan pattern covering every key the engine owns
	pub fn all_pattern(&self) -> String {
		format!("{}:*", self.prefix)
	}

	/// Parse the collection id back out of a state key
	pub fn id_from_state_key(&self, key: &str) -> Option<Uuid> {
		let suffix = key.strip_prefix(&format!("{}:state:", self.prefix))?;
		Uuid::parse_str(suffix).ok()
	}

	/// Singleton: when the last full rebuild completed (RFC 3339)
	pub fn last_full_rebuild(&self) -> String {
		format!("{}:meta:last_full_rebuild", self.prefix)
	}

	/// Singleton: how many collections that rebuild indexed (decimal)
	pub fn total_indexed(&self) -> String {
		format!("{}:meta:total_indexed", self.prefix)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::CollectionKind;

	#[test]
	fn key_shapes() {
		let keys = KeySpace::new("cidx");
		let lib = Uuid::nil();
		assert_eq!(
			keys.sorted(&Scope::Global, SortField::UpdatedAt, SortDirection::Desc),
			"cidx:sort:all:updated_at:desc"
		);
		assert_eq!(
			keys.sorted(&Scope::Library(lib), SortField::Name, SortDirection::Asc),
			format!("cidx:sort:lib:{lib}:name:asc")
		);
		assert_eq!(
			keys.sorted(
				&Scope::Kind(CollectionKind::Album),
				SortField::ItemCount,
				SortDirection::Asc
			),
			"cidx:sort:kind:album:item_count:asc"
		);
	}

	#[test]
	fn state_key_round_trips_the_id() {
		let keys = KeySpace::new("cidx");
		let id = Uuid::new_v4();
		assert_eq!(keys.id_from_state_key(&keys.state(id)), Some(id));
		assert_eq!(keys.id_from_state_key("cidx:summary"), None);
		assert_eq!(keys.id_from_state_key("cidx:state:not-a-uuid"), None);
	}
}
