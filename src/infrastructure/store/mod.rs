//! Sorted-set store abstraction
//!
//! Thin primitives over a redis-class key/sorted-set store. No business
//! logic lives here; scoring and key layout are decided by the callers.

pub mod keys;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use keys::KeySpace;
pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Store-level failures
#[derive(Error, Debug)]
pub enum StoreError {
	/// The store cannot be reached at all
	#[error("store unreachable: {0}")]
	Unavailable(String),

	/// The store answered but the operation failed
	#[error("store operation failed: {0}")]
	Backend(String),
}

impl StoreError {
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Self::Unavailable(_))
	}
}

/// A single mutation inside a pipelined batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
	ZAdd {
		key: String,
		member: String,
		score: i64,
	},
	ZRem {
		key: String,
		member: String,
	},
	HSet {
		key: String,
		field: String,
		value: Vec<u8>,
	},
	HDel {
		key: String,
		field: String,
	},
	Set {
		key: String,
		value: Vec<u8>,
	},
	Del {
		key: String,
	},
}

/// An ordered batch of mutations applied in one round trip.
///
/// Ops are executed in push order; callers rely on this to sequence
/// stale-scope removals before the adds that replace them.
#[derive(Debug, Default)]
pub struct WriteBatch {
	ops: Vec<WriteOp>,
}

impl WriteBatch {
	pub fn zadd(&mut self, key: String, member: String, score: i64) {
		self.ops.push(WriteOp::ZAdd { key, member, score });
	}

	pub fn zrem(&mut self, key: String, member: String) {
		self.ops.push(WriteOp::ZRem { key, member });
	}

	pub fn hset(&mut self, key: String, field: String, value: Vec<u8>) {
		self.ops.push(WriteOp::HSet { key, field, value });
	}

	pub fn hdel(&mut self, key: String, field: String) {
		self.ops.push(WriteOp::HDel { key, field });
	}

	pub fn set(&mut self, key: String, value: Vec<u8>) {
		self.ops.push(WriteOp::Set { key, value });
	}

	pub fn del(&mut self, key: String) {
		self.ops.push(WriteOp::Del { key });
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	pub fn ops(&self) -> &[WriteOp] {
		&self.ops
	}

	pub fn into_ops(self) -> Vec<WriteOp> {
		self.ops
	}
}

/// Primitive operations over a key/sorted-set store.
///
/// All range queries return members in ascending rank order; score sign
/// encodes direction, so ascending rank always means "requested order".
#[async_trait]
pub trait SortedSetStore: Send + Sync {
	/// Apply a batch of mutations in order, in one round trip
	async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;

	/// Zero-based rank of a member, or `None` when absent
	async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError>;

	/// Members between two ranks inclusive; negative indices count from the
	/// end as in redis
	async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;

	/// Cardinality of a sorted set
	async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

	/// Single hash field fetch
	async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError>;

	/// Batched hash field fetch, one slot per requested field
	async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

	/// Plain key fetch
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

	/// Non-blocking enumeration of keys matching a `prefix*` pattern; safe
	/// to run concurrently with writes
	async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

	/// Convenience single-op variants of [`Self::apply`]
	async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
		let mut batch = WriteBatch::default();
		batch.zadd(key.to_string(), member.to_string(), score);
		self.apply(batch).await
	}

	async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
		let mut batch = WriteBatch::default();
		batch.zrem(key.to_string(), member.to_string());
		self.apply(batch).await
	}

	async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
		let mut batch = WriteBatch::default();
		batch.set(key.to_string(), value);
		self.apply(batch).await
	}

	async fn del(&self, key: &str) -> Result<(), StoreError> {
		let mut batch = WriteBatch::default();
		batch.del(key.to_string());
		self.apply(batch).await
	}
}
