//! Infrastructure: store adapters and external collaborators

pub mod primary;
pub mod store;

pub use primary::PrimaryStore;
pub use store::{KeySpace, MemoryStore, RedisStore, SortedSetStore, StoreError, WriteBatch};
