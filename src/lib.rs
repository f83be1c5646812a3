//! Collection sorted-index and reconciliation engine
//!
//! Sits between a primary document store holding collection records and the
//! read paths that need fast pagination, previous/next navigation and
//! filtered sorted listings. Maintains one sorted set per
//! (scope, field, direction) combination in a redis-class store, plus a
//! compact summary per collection for batched hydration, and keeps the two
//! stores reconciled:
//!
//! - Per-collection upserts with explicit scope-move handling
//! - Incremental change detection via persisted index state
//! - Memory-bounded bulk rebuilds over tens of thousands of collections
//! - Bidirectional consistency verification with optional repair
//!
//! When a rebuild runs is the operator's decision; the engine only defines
//! the algorithms and the guarantees.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod operations;
pub mod services;

pub use config::IndexConfig;
pub use domain::{
	Collection, CollectionKind, CollectionSummary, PreviewAsset, Scope, SortDirection, SortField,
};
pub use error::{IndexError, Result};
pub use infrastructure::{MemoryStore, PrimaryStore, RedisStore, SortedSetStore};
pub use operations::indexing::{
	ConsistencyVerifier, FilePreviewSource, IndexState, IndexWriter, PreviewSource, RebuildMode,
	RebuildOptions, RebuildOrchestrator, RebuildStats, VerifyResult,
};
pub use services::{AdminService, CollectionPage, MaintenanceReport, Navigation, QueryService, Siblings};

use infrastructure::store::KeySpace;
use std::sync::Arc;

/// The wired-up engine: one writer, orchestrator, verifier and the two
/// caller-facing services sharing a store and a primary-store collaborator
pub struct CollectionIndex {
	writer: Arc<IndexWriter>,
	query: QueryService,
	admin: AdminService,
}

impl CollectionIndex {
	pub fn new(
		primary: Arc<dyn PrimaryStore>,
		store: Arc<dyn SortedSetStore>,
		config: IndexConfig,
	) -> Self {
		Self::build(primary, store, config, None)
	}

	/// Engine with preview-asset byte caching enabled
	pub fn with_preview_source(
		primary: Arc<dyn PrimaryStore>,
		store: Arc<dyn SortedSetStore>,
		config: IndexConfig,
		preview_source: Arc<dyn PreviewSource>,
	) -> Self {
		Self::build(primary, store, config, Some(preview_source))
	}

	fn build(
		primary: Arc<dyn PrimaryStore>,
		store: Arc<dyn SortedSetStore>,
		config: IndexConfig,
		preview_source: Option<Arc<dyn PreviewSource>>,
	) -> Self {
		let config = config.sanitized();
		let keys = KeySpace::new(&config.key_prefix);
		let writer = Arc::new(IndexWriter::new(store.clone(), &config, preview_source));
		let orchestrator = Arc::new(RebuildOrchestrator::new(
			primary.clone(),
			store.clone(),
			writer.clone(),
			config.clone(),
		));
		let verifier = Arc::new(ConsistencyVerifier::new(
			primary.clone(),
			store.clone(),
			writer.clone(),
			orchestrator.clone(),
			&config,
		));
		let query = QueryService::new(
			store.clone(),
			primary,
			writer.clone(),
			keys.clone(),
			config.scan_page_size,
		);
		let admin = AdminService::new(orchestrator, verifier, store, keys);
		Self {
			writer,
			query,
			admin,
		}
	}

	/// Single-collection write path; call after a primary-store mutation
	pub fn writer(&self) -> &IndexWriter {
		&self.writer
	}

	/// Read path for listing and detail screens
	pub fn query(&self) -> &QueryService {
		&self.query
	}

	/// Operator surface: rebuilds, verification, state inspection
	pub fn admin(&self) -> &AdminService {
		&self.admin
	}
}
