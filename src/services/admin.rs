//! Operator/admin surface
//!
//! The single administrative entry point: rebuilds, verification, per
//! collection state inspection and the lightweight validity check backed by
//! the singleton metadata keys.

use crate::{
	error::Result,
	infrastructure::store::{KeySpace, SortedSetStore},
	operations::indexing::{
		ConsistencyVerifier, IndexState, RebuildMode, RebuildOptions, RebuildOrchestrator,
		RebuildStats, StateTracker, VerifyResult,
	},
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What an administrative run produced
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceReport {
	Rebuild(RebuildStats),
	Verify(VerifyResult),
}

/// Administrative command surface
pub struct AdminService {
	orchestrator: Arc<RebuildOrchestrator>,
	verifier: Arc<ConsistencyVerifier>,
	tracker: StateTracker,
	store: Arc<dyn SortedSetStore>,
	keys: KeySpace,
}

impl AdminService {
	pub fn new(
		orchestrator: Arc<RebuildOrchestrator>,
		verifier: Arc<ConsistencyVerifier>,
		store: Arc<dyn SortedSetStore>,
		keys: KeySpace,
	) -> Self {
		Self {
			tracker: StateTracker::new(store.clone(), keys.clone()),
			orchestrator,
			verifier,
			store,
			keys,
		}
	}

	/// Run a rebuild in the requested mode. `Verify` routes to the
	/// consistency verifier, honouring `options.dry_run`.
	pub async fn rebuild_index(
		&self,
		mode: RebuildMode,
		options: RebuildOptions,
	) -> Result<MaintenanceReport> {
		match mode {
			RebuildMode::Verify => {
				let result = self.verifier.verify(options.dry_run, options.cancel).await?;
				Ok(MaintenanceReport::Verify(result))
			}
			_ => {
				let stats = self.orchestrator.rebuild(mode, options).await?;
				Ok(MaintenanceReport::Rebuild(stats))
			}
		}
	}

	/// Diff (and unless `dry_run`, repair) the index against the primary
	/// store
	pub async fn verify_index(&self, dry_run: bool) -> Result<VerifyResult> {
		self.verifier.verify(dry_run, None).await
	}

	/// Inspect one collection's change-detection state
	pub async fn entity_index_state(&self, id: Uuid) -> Result<Option<IndexState>> {
		self.tracker.get(id).await
	}

	/// Cheap validity check: true iff both metadata singletons are present
	/// and the recorded count is non-zero
	pub async fn is_index_valid(&self) -> Result<bool> {
		let last_rebuild = self.store.get(&self.keys.last_full_rebuild()).await?;
		let total = self.store.get(&self.keys.total_indexed()).await?;
		let count = total
			.as_deref()
			.and_then(|bytes| std::str::from_utf8(bytes).ok())
			.and_then(|s| s.parse::<u64>().ok())
			.unwrap_or(0);
		Ok(last_rebuild.is_some() && count > 0)
	}
}
