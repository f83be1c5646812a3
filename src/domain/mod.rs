//! Domain types for the collection index

pub mod collection;
pub mod ordering;
pub mod summary;

pub use collection::{Collection, CollectionKind, PreviewAsset};
pub use ordering::{Scope, SortDirection, SortField};
pub use summary::{CollectionSummary, SUMMARY_SCHEMA_VERSION};
