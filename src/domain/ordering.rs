//! Sort fields, directions, scopes and score encoding
//!
//! Every sorted set orders members by a signed integer score. Scores are
//! constrained to the f64-exact integer range so that the redis double
//! representation round-trips without drift and repeated writes stay
//! byte-stable.

use super::collection::{Collection, CollectionKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Largest magnitude a score may take; f64 represents integers exactly up
/// to 2^53.
const MAX_EXACT_SCORE: i64 = 1 << 53;

/// Number of name bytes packed into the lexical score prefix.
const NAME_PREFIX_BYTES: usize = 6;

/// A field the index maintains a sort order for
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
	strum::EnumIter,
	strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
	CreatedAt,
	UpdatedAt,
	Name,
	ItemCount,
	TotalSize,
}

/// Requested ordering direction
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
	strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
	Asc,
	Desc,
}

/// A named partition of the index over which a sort order is independently
/// maintained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
	/// All collections across every library
	Global,
	/// Collections belonging to one library
	Library(Uuid),
	/// Collections of one kind
	Kind(CollectionKind),
}

impl Scope {
	/// Stable key segment for this scope
	pub fn segment(&self) -> String {
		match self {
			Self::Global => "all".to_string(),
			Self::Library(id) => format!("lib:{id}"),
			Self::Kind(kind) => format!("kind:{kind}"),
		}
	}

	/// Every scope a collection belongs to
	pub fn of(collection: &Collection) -> [Scope; 3] {
		[
			Self::Global,
			Self::Library(collection.library_id),
			Self::Kind(collection.kind),
		]
	}
}

/// Compute the sorted-set score for one field/direction pair.
///
/// Ascending rank order in the resulting set always corresponds to the
/// requested direction: descending scores are negated at write time.
pub fn score_for(collection: &Collection, field: SortField, direction: SortDirection) -> i64 {
	let ascending = match field {
		SortField::CreatedAt => clamp_exact(collection.created_at.timestamp_millis()),
		SortField::UpdatedAt => clamp_exact(collection.updated_at.timestamp_millis()),
		SortField::Name => name_score(&collection.name),
		SortField::ItemCount => i64::from(collection.item_count),
		SortField::TotalSize => clamp_exact(collection.total_size_bytes.min(i64::MAX as u64) as i64),
	};
	match direction {
		SortDirection::Asc => ascending,
		SortDirection::Desc => -ascending,
	}
}

/// Order-preserving lexical prefix key: the first six bytes of the
/// case-folded name packed big-endian into a 48-bit integer. Names that
/// share the full prefix tie and fall back to the sorted set's member-id
/// tiebreak.
fn name_score(name: &str) -> i64 {
	let folded = name.to_lowercase();
	let bytes = folded.as_bytes();
	let mut packed: u64 = 0;
	for i in 0..NAME_PREFIX_BYTES {
		packed = (packed << 8) | u64::from(bytes.get(i).copied().unwrap_or(0));
	}
	packed as i64
}

fn clamp_exact(value: i64) -> i64 {
	value.clamp(-MAX_EXACT_SCORE, MAX_EXACT_SCORE)
}

/// Comparator equivalent to the index order for one field/direction pair,
/// used by the degraded read path when the store is unreachable. Ties break
/// ascending on the member id string, matching redis member ordering.
pub fn compare_like_index(
	a: &Collection,
	b: &Collection,
	field: SortField,
	direction: SortDirection,
) -> Ordering {
	score_for(a, field, direction)
		.cmp(&score_for(b, field, direction))
		.then_with(|| a.id.to_string().cmp(&b.id.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn sample(name: &str) -> Collection {
		Collection {
			id: Uuid::new_v4(),
			library_id: Uuid::new_v4(),
			kind: CollectionKind::Album,
			name: name.to_string(),
			created_at: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
			updated_at: chrono::Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
			item_count: 3,
			preview_count: 1,
			derived_count: 0,
			total_size_bytes: 1024,
			preview_assets: vec![],
			deleted_at: None,
		}
	}

	#[test]
	fn name_scores_follow_lexical_prefix_order() {
		let names = ["alpha", "Beta", "beach", "zzz", "a"];
		let mut by_score: Vec<_> = names.to_vec();
		by_score.sort_by_key(|n| score_for(&sample(n), SortField::Name, SortDirection::Asc));
		let mut by_name: Vec<_> = names.to_vec();
		by_name.sort_by_key(|n| n.to_lowercase());
		assert_eq!(by_score, by_name);
	}

	#[test]
	fn descending_negates_ascending() {
		let c = sample("abc");
		for field in [
			SortField::CreatedAt,
			SortField::UpdatedAt,
			SortField::Name,
			SortField::ItemCount,
			SortField::TotalSize,
		] {
			assert_eq!(
				score_for(&c, field, SortDirection::Desc),
				-score_for(&c, field, SortDirection::Asc),
			);
		}
	}

	#[test]
	fn scores_stay_in_f64_exact_range() {
		let mut c = sample("\u{10FFFF}\u{10FFFF}\u{10FFFF}");
		c.total_size_bytes = u64::MAX;
		c.created_at = chrono::Utc.timestamp_opt(253_402_300_799, 0).unwrap();
		for field in [SortField::CreatedAt, SortField::Name, SortField::TotalSize] {
			let score = score_for(&c, field, SortDirection::Asc);
			assert!(score.abs() <= MAX_EXACT_SCORE);
			assert_eq!(score as f64 as i64, score);
		}
	}
}
