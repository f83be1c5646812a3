//! Cross-store consistency verification
//!
//! Bidirectional diff between the primary store and the index: a forward
//! scan finds collections missing from or outdated in the index, a reverse
//! scan finds index entries whose collection no longer exists, and an
//! optional repair phase converges the two.

use super::{
	rebuild::{RebuildMode, RebuildOptions, RebuildOrchestrator, RebuildStats},
	state::StateTracker,
	writer::IndexWriter,
};
use crate::{
	config::IndexConfig,
	error::{IndexError, Result},
	infrastructure::{store::KeySpace, PrimaryStore, SortedSetStore},
};
use futures::StreamExt;
use serde::Serialize;
use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
	/// True iff nothing was missing, outdated or orphaned
	pub is_consistent: bool,
	pub total_in_primary: u64,
	pub total_in_index: u64,
	pub to_add: u64,
	pub to_update: u64,
	pub to_remove: u64,
	pub missing_in_index: Vec<Uuid>,
	pub outdated_in_index: Vec<Uuid>,
	pub orphaned_in_index: Vec<Uuid>,
	pub duration: Duration,
	pub dry_run: bool,
}

/// Verifies and optionally repairs index consistency
pub struct ConsistencyVerifier {
	primary: Arc<dyn PrimaryStore>,
	tracker: StateTracker,
	writer: Arc<IndexWriter>,
	orchestrator: Arc<RebuildOrchestrator>,
	scan_page_size: u64,
}

impl ConsistencyVerifier {
	pub fn new(
		primary: Arc<dyn PrimaryStore>,
		store: Arc<dyn SortedSetStore>,
		writer: Arc<IndexWriter>,
		orchestrator: Arc<RebuildOrchestrator>,
		config: &IndexConfig,
	) -> Self {
		let keys = KeySpace::new(&config.key_prefix);
		Self {
			tracker: StateTracker::new(store, keys),
			primary,
			writer,
			orchestrator,
			scan_page_size: config.scan_page_size,
		}
	}

	/// Run the three-phase verification. With `dry_run` the diff is
	/// reported without repairs.
	pub async fn verify(
		&self,
		dry_run: bool,
		cancel: Option<watch::Receiver<bool>>,
	) -> Result<VerifyResult> {
		let started = Instant::now();
		info!(dry_run, "index verification starting");

		let total_in_primary = self
			.primary
			.count_active()
			.await
			.map_err(IndexError::primary)?;
		let mut missing_in_index = Vec::new();
		let mut outdated_in_index = Vec::new();

		// Phase 1: forward scan (primary store -> index)
		let mut skip = 0u64;
		loop {
			if is_cancelled(&cancel) {
				break;
			}
			let page = self
				.primary
				.page_active(skip, self.scan_page_size)
				.await
				.map_err(IndexError::primary)?;
			if page.is_empty() {
				break;
			}
			skip += page.len() as u64;
			for collection in &page {
				match self.tracker.get(collection.id).await? {
					None => missing_in_index.push(collection.id),
					Some(state) => {
						if state.is_stale(collection) || state.missing_first_preview(collection) {
							outdated_in_index.push(collection.id);
						}
					}
				}
			}
		}

		// Phase 2: reverse scan (index -> primary store)
		let mut tracked = Vec::new();
		{
			let stream = self.tracker.list_tracked_ids();
			tokio::pin!(stream);
			while let Some(id) = stream.next().await {
				tracked.push(id?);
			}
		}
		let total_in_index = tracked.len() as u64;

		let mut orphaned_in_index = Vec::new();
		for chunk in tracked.chunks((self.scan_page_size as usize).max(1)) {
			if is_cancelled(&cancel) {
				break;
			}
			let found = self
				.primary
				.get_by_ids(chunk)
				.await
				.map_err(IndexError::primary)?;
			let live: HashMap<Uuid, bool> =
				found.iter().map(|c| (c.id, !c.is_deleted())).collect();
			for id in chunk {
				if !live.get(id).copied().unwrap_or(false) {
					orphaned_in_index.push(*id);
				}
			}
		}

		let mut result = VerifyResult {
			is_consistent: missing_in_index.is_empty()
				&& outdated_in_index.is_empty()
				&& orphaned_in_index.is_empty(),
			total_in_primary,
			total_in_index,
			to_add: missing_in_index.len() as u64,
			to_update: outdated_in_index.len() as u64,
			to_remove: orphaned_in_index.len() as u64,
			missing_in_index,
			outdated_in_index,
			orphaned_in_index,
			duration: Duration::ZERO,
			dry_run,
		};

		// Phase 3: repair
		if !dry_run && !result.is_consistent {
			self.repair(&result, cancel).await?;
		}

		result.duration = started.elapsed();
		info!(
			consistent = result.is_consistent,
			to_add = result.to_add,
			to_update = result.to_update,
			to_remove = result.to_remove,
			duration_ms = result.duration.as_millis() as u64,
			"index verification finished"
		);
		Ok(result)
	}

	async fn repair(
		&self,
		result: &VerifyResult,
		cancel: Option<watch::Receiver<bool>>,
	) -> Result<()> {
		let mut to_rebuild = Vec::with_capacity(result.missing_in_index.len() + result.outdated_in_index.len());
		to_rebuild.extend_from_slice(&result.missing_in_index);
		to_rebuild.extend_from_slice(&result.outdated_in_index);

		let options = RebuildOptions {
			skip_preview_caching: false,
			dry_run: false,
			cancel: cancel.clone(),
		};
		let mut repair_stats = RebuildStats::new(RebuildMode::ForceAll);
		self.orchestrator
			.process_ids(&to_rebuild, &options, &mut repair_stats)
			.await?;

		for id in &result.orphaned_in_index {
			if is_cancelled(&cancel) {
				break;
			}
			match self.writer.remove(*id).await {
				Ok(()) => {}
				Err(e) if e.is_store_unavailable() => return Err(e),
				Err(e) => warn!(collection_id = %id, "failed to remove orphan: {e}"),
			}
		}
		Ok(())
	}
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
	cancel.as_ref().map(|c| *c.borrow()).unwrap_or(false)
}
