//! In-process store implementation
//!
//! Mirrors redis sorted-set semantics (score order, member-lexicographic
//! tiebreak, negative range indices). Used by the test suite and by
//! embedded deployments that run without an external store.

use super::{SortedSetStore, StoreError, WriteBatch, WriteOp};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
	/// Sorted sets as (score, member) ordered pairs plus a member -> score
	/// lookup for updates
	sorted: HashMap<String, SortedSet>,
	hashes: HashMap<String, HashMap<String, Vec<u8>>>,
	values: HashMap<String, Vec<u8>>,
}

#[derive(Default)]
struct SortedSet {
	ordered: BTreeSet<(i64, String)>,
	scores: HashMap<String, i64>,
}

impl SortedSet {
	fn insert(&mut self, member: String, score: i64) {
		if let Some(old) = self.scores.insert(member.clone(), score) {
			self.ordered.remove(&(old, member.clone()));
		}
		self.ordered.insert((score, member));
	}

	fn remove(&mut self, member: &str) {
		if let Some(old) = self.scores.remove(member) {
			self.ordered.remove(&(old, member.to_string()));
		}
	}

	fn rank(&self, member: &str) -> Option<u64> {
		let score = *self.scores.get(member)?;
		self.ordered
			.iter()
			.position(|entry| entry.0 == score && entry.1 == member)
			.map(|p| p as u64)
	}
}

/// A store kept entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
	inner: RwLock<MemoryInner>,
}

/// Stable dump of one key's contents, for equality assertions in tests
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDump {
	Sorted(Vec<(i64, String)>),
	Hash(BTreeMap<String, Vec<u8>>),
	Value(Vec<u8>),
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of every key, used to assert byte-for-byte idempotence
	pub async fn snapshot(&self) -> BTreeMap<String, KeyDump> {
		let inner = self.inner.read().await;
		let mut out = BTreeMap::new();
		for (key, set) in &inner.sorted {
			if !set.ordered.is_empty() {
				out.insert(
					key.clone(),
					KeyDump::Sorted(set.ordered.iter().cloned().collect()),
				);
			}
		}
		for (key, hash) in &inner.hashes {
			if !hash.is_empty() {
				out.insert(
					key.clone(),
					KeyDump::Hash(hash.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
				);
			}
		}
		for (key, value) in &inner.values {
			out.insert(key.clone(), KeyDump::Value(value.clone()));
		}
		out
	}
}

fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
	let len = len as i64;
	let mut start = if start < 0 { len + start } else { start };
	let mut stop = if stop < 0 { len + stop } else { stop };
	start = start.max(0);
	stop = stop.min(len - 1);
	if len == 0 || start > stop {
		return None;
	}
	Some((start as usize, stop as usize))
}

#[async_trait]
impl SortedSetStore for MemoryStore {
	async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
		let mut inner = self.inner.write().await;
		for op in batch.into_ops() {
			match op {
				WriteOp::ZAdd { key, member, score } => {
					inner.sorted.entry(key).or_default().insert(member, score);
				}
				WriteOp::ZRem { key, member } => {
					if let Some(set) = inner.sorted.get_mut(&key) {
						set.remove(&member);
					}
				}
				WriteOp::HSet { key, field, value } => {
					inner.hashes.entry(key).or_default().insert(field, value);
				}
				WriteOp::HDel { key, field } => {
					if let Some(hash) = inner.hashes.get_mut(&key) {
						hash.remove(&field);
					}
				}
				WriteOp::Set { key, value } => {
					inner.values.insert(key, value);
				}
				WriteOp::Del { key } => {
					inner.values.remove(&key);
					inner.sorted.remove(&key);
					inner.hashes.remove(&key);
				}
			}
		}
		Ok(())
	}

	async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner.sorted.get(key).and_then(|set| set.rank(member)))
	}

	async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
		let inner = self.inner.read().await;
		let Some(set) = inner.sorted.get(key) else {
			return Ok(vec![]);
		};
		let Some((start, stop)) = normalize_range(start, stop, set.ordered.len()) else {
			return Ok(vec![]);
		};
		Ok(set
			.ordered
			.iter()
			.skip(start)
			.take(stop - start + 1)
			.map(|(_, member)| member.clone())
			.collect())
	}

	async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner
			.sorted
			.get(key)
			.map(|set| set.ordered.len() as u64)
			.unwrap_or(0))
	}

	async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner
			.hashes
			.get(key)
			.and_then(|hash| hash.get(field).cloned()))
	}

	async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
		let inner = self.inner.read().await;
		let hash = inner.hashes.get(key);
		Ok(fields
			.iter()
			.map(|field| hash.and_then(|h| h.get(field).cloned()))
			.collect())
	}

	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner.values.get(key).cloned())
	}

	async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
		let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
		let inner = self.inner.read().await;
		let mut keys: Vec<String> = inner
			.sorted
			.keys()
			.filter(|k| !inner.sorted[*k].ordered.is_empty())
			.chain(inner.hashes.keys())
			.chain(inner.values.keys())
			.filter(|k| k.starts_with(prefix))
			.cloned()
			.collect();
		keys.sort();
		keys.dedup();
		Ok(keys)
	}
}
