//! Redis-backed store implementation
//!
//! Pooled connections via bb8; batches become a single pipeline round trip.

use super::{SortedSetStore, StoreError, WriteBatch, WriteOp};
use async_trait::async_trait;
use bb8_redis::{
	bb8,
	redis::{self, AsyncCommands, ErrorKind, RedisError},
	RedisConnectionManager,
};

const SCAN_COUNT: u64 = 500;

/// Store backed by a redis-class server
pub struct RedisStore {
	pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisStore {
	/// Connect to the store at `url` (e.g. `redis://127.0.0.1/`)
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let manager = RedisConnectionManager::new(url).map_err(map_redis_err)?;
		let pool = bb8::Pool::builder()
			.build(manager)
			.await
			.map_err(map_redis_err)?;
		Ok(Self { pool })
	}

	async fn conn(
		&self,
	) -> Result<bb8::PooledConnection<'_, RedisConnectionManager>, StoreError> {
		self.pool
			.get()
			.await
			.map_err(|e| StoreError::Unavailable(e.to_string()))
	}
}

fn map_redis_err(e: RedisError) -> StoreError {
	if matches!(e.kind(), ErrorKind::IoError)
		|| e.is_connection_refusal()
		|| e.is_connection_dropped()
		|| e.is_timeout()
	{
		StoreError::Unavailable(e.to_string())
	} else {
		StoreError::Backend(e.to_string())
	}
}

#[async_trait]
impl SortedSetStore for RedisStore {
	async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
		if batch.is_empty() {
			return Ok(());
		}
		let mut conn = self.conn().await?;
		let mut pipe = redis::pipe();
		for op in batch.into_ops() {
			match op {
				WriteOp::ZAdd { key, member, score } => {
					pipe.zadd(key, member, score).ignore();
				}
				WriteOp::ZRem { key, member } => {
					pipe.zrem(key, member).ignore();
				}
				WriteOp::HSet { key, field, value } => {
					pipe.hset(key, field, value).ignore();
				}
				WriteOp::HDel { key, field } => {
					pipe.hdel(key, field).ignore();
				}
				WriteOp::Set { key, value } => {
					pipe.set(key, value).ignore();
				}
				WriteOp::Del { key } => {
					pipe.del(key).ignore();
				}
			}
		}
		pipe.query_async::<_, ()>(&mut *conn)
			.await
			.map_err(map_redis_err)
	}

	async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
		let mut conn = self.conn().await?;
		conn.zrank(key, member).await.map_err(map_redis_err)
	}

	async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
		let mut conn = self.conn().await?;
		conn.zrange(key, start as isize, stop as isize)
			.await
			.map_err(map_redis_err)
	}

	async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
		let mut conn = self.conn().await?;
		conn.zcard(key).await.map_err(map_redis_err)
	}

	async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let mut conn = self.conn().await?;
		conn.hget(key, field).await.map_err(map_redis_err)
	}

	async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
		if fields.is_empty() {
			return Ok(vec![]);
		}
		let mut conn = self.conn().await?;
		redis::cmd("HMGET")
			.arg(key)
			.arg(fields)
			.query_async(&mut *conn)
			.await
			.map_err(map_redis_err)
	}

	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let mut conn = self.conn().await?;
		conn.get(key).await.map_err(map_redis_err)
	}

	async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
		let mut conn = self.conn().await?;
		let mut keys = Vec::new();
		let mut cursor: u64 = 0;
		loop {
			let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
				.arg(cursor)
				.arg("MATCH")
				.arg(pattern)
				.arg("COUNT")
				.arg(SCAN_COUNT)
				.query_async(&mut *conn)
				.await
				.map_err(map_redis_err)?;
			keys.extend(page);
			cursor = next;
			if cursor == 0 {
				break;
			}
		}
		// SCAN may return duplicates while the keyspace is mutating
		keys.sort();
		keys.dedup();
		Ok(keys)
	}
}
