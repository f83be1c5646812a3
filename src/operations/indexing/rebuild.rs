//! Bulk rebuild orchestration
//!
//! Pages the primary store, decides per collection whether a rebuild is
//! needed, and writes in bounded batches so that peak resident memory and
//! in-flight store operations stay capped regardless of dataset size.
//! Per-batch working buffers live inside the batch scope and are released
//! deterministically at scope exit.

use super::{state::StateTracker, writer::IndexWriter};
use crate::{
	config::IndexConfig,
	domain::CollectionSummary,
	error::{IndexError, Result},
	infrastructure::{
		store::{KeySpace, SortedSetStore, WriteBatch},
		PrimaryStore,
	},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
	sync::Arc,
	time::{Duration, Instant},
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a rebuild run decides what to write
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RebuildMode {
	/// Rebuild only collections whose `updated_at` advanced past their
	/// recorded index state (or that have no state at all)
	ChangedOnly,
	/// Clear the entire index first, then rebuild everything
	Full,
	/// Rebuild everything in place without clearing; used after a scoring
	/// or schema change
	ForceAll,
	/// Run the consistency verifier instead of a scan-and-decide pass
	Verify,
}

/// Caller-supplied options for a rebuild run
#[derive(Debug, Clone, Default)]
pub struct RebuildOptions {
	/// Skip preview-asset byte caching entirely, trading smaller summaries
	/// for speed
	pub skip_preview_caching: bool,
	/// Classify and count only; write nothing
	pub dry_run: bool,
	/// Checked between batches; already-written batches stay valid
	pub cancel: Option<watch::Receiver<bool>>,
}

impl RebuildOptions {
	fn is_cancelled(&self) -> bool {
		self.cancel.as_ref().map(|c| *c.borrow()).unwrap_or(false)
	}
}

/// Outcome of a rebuild run
#[derive(Debug, Clone, Serialize)]
pub struct RebuildStats {
	pub mode: RebuildMode,
	/// Collections seen in the primary store
	pub total: u64,
	/// Collections (re)written — or, on a dry run, that would be
	pub rebuilt: u64,
	/// Collections left untouched by change detection
	pub skipped: u64,
	/// Collections skipped over recoverable per-entity or per-batch errors
	pub failed: u64,
	pub duration: Duration,
	/// Largest per-batch staged-buffer estimate observed
	pub peak_batch_bytes: u64,
}

impl RebuildStats {
	pub(crate) fn new(mode: RebuildMode) -> Self {
		Self {
			mode,
			total: 0,
			rebuilt: 0,
			skipped: 0,
			failed: 0,
			duration: Duration::ZERO,
			peak_batch_bytes: 0,
		}
	}
}

/// Drives full and incremental rebuilds
pub struct RebuildOrchestrator {
	primary: Arc<dyn PrimaryStore>,
	store: Arc<dyn SortedSetStore>,
	writer: Arc<IndexWriter>,
	tracker: StateTracker,
	keys: KeySpace,
	config: IndexConfig,
}

impl RebuildOrchestrator {
	pub fn new(
		primary: Arc<dyn PrimaryStore>,
		store: Arc<dyn SortedSetStore>,
		writer: Arc<IndexWriter>,
		config: IndexConfig,
	) -> Self {
		let keys = KeySpace::new(&config.key_prefix);
		Self {
			tracker: StateTracker::new(store.clone(), keys.clone()),
			primary,
			store,
			writer,
			keys,
			config,
		}
	}

	/// Run one rebuild. `Verify` is not a scan mode; the operator surface
	/// routes it to the consistency verifier.
	pub async fn rebuild(&self, mode: RebuildMode, options: RebuildOptions) -> Result<RebuildStats> {
		if mode == RebuildMode::Verify {
			return Err(IndexError::NotAScanMode(mode));
		}
		let started = Instant::now();
		let mut stats = RebuildStats::new(mode);
		info!(%mode, dry_run = options.dry_run, "index rebuild starting");

		if mode == RebuildMode::Full && !options.dry_run {
			self.clear_all().await?;
		}

		let pending = self.classify(mode, &mut stats).await?;

		if options.dry_run {
			stats.rebuilt = pending.len() as u64;
			stats.duration = started.elapsed();
			info!(
				total = stats.total,
				would_rebuild = stats.rebuilt,
				skipped = stats.skipped,
				"dry run complete"
			);
			return Ok(stats);
		}

		let completed = self.process_ids(&pending, &options, &mut stats).await;
		stats.duration = started.elapsed();
		let completed = match completed {
			Ok(completed) => completed,
			Err(IndexError::RebuildAborted { mut stats, source }) => {
				stats.duration = started.elapsed();
				error!("index rebuild aborted: {source}");
				return Err(IndexError::RebuildAborted { stats, source });
			}
			Err(e) => {
				error!("index rebuild aborted: {e}");
				return Err(e);
			}
		};

		if completed && matches!(mode, RebuildMode::Full | RebuildMode::ForceAll) {
			self.write_meta(stats.total).await?;
		}

		info!(
			total = stats.total,
			rebuilt = stats.rebuilt,
			skipped = stats.skipped,
			failed = stats.failed,
			duration_ms = stats.duration.as_millis() as u64,
			"index rebuild finished"
		);
		Ok(stats)
	}

	/// Page through the primary store and collect the ids that need a
	/// rebuild. Only ids are retained; page entities are dropped as soon as
	/// each page is classified.
	async fn classify(&self, mode: RebuildMode, stats: &mut RebuildStats) -> Result<Vec<Uuid>> {
		let mut pending = Vec::new();
		let mut skip = 0u64;
		loop {
			let page = self
				.primary
				.page_active(skip, self.config.scan_page_size)
				.await
				.map_err(IndexError::primary)?;
			if page.is_empty() {
				break;
			}
			skip += page.len() as u64;
			for collection in &page {
				stats.total += 1;
				let needs_rebuild = match mode {
					RebuildMode::ChangedOnly => match self.tracker.get(collection.id).await? {
						None => true,
						Some(state) => state.is_stale(collection),
					},
					RebuildMode::Full | RebuildMode::ForceAll => true,
					RebuildMode::Verify => unreachable!("rejected above"),
				};
				if needs_rebuild {
					pending.push(collection.id);
				} else {
					stats.skipped += 1;
				}
			}
		}
		debug!(
			pending = pending.len(),
			skipped = stats.skipped,
			"classification scan complete"
		);
		Ok(pending)
	}

	/// Process an id set in bounded batches. Returns `Ok(false)` when
	/// cancelled between batches. Store unavailability aborts the run with
	/// partial statistics attached; any other batch failure is recorded and
	/// the run continues.
	pub(crate) async fn process_ids(
		&self,
		ids: &[Uuid],
		options: &RebuildOptions,
		stats: &mut RebuildStats,
	) -> Result<bool> {
		for chunk in ids.chunks(self.config.rebuild_batch_size.max(1)) {
			if options.is_cancelled() {
				info!(rebuilt = stats.rebuilt, "rebuild cancelled between batches");
				return Ok(false);
			}
			match self.process_batch(chunk, options, stats).await {
				Ok(()) => {}
				Err(IndexError::Store(e)) if e.is_unavailable() => {
					return Err(IndexError::RebuildAborted {
						stats: Box::new(stats.clone()),
						source: e,
					});
				}
				Err(e) => return Err(e),
			}
		}
		Ok(true)
	}

	/// One pipelined round trip covering every collection in `chunk`.
	/// Writer batches are ordered per entity, so a failed apply never
	/// leaves a half-written collection visible.
	async fn process_batch(
		&self,
		chunk: &[Uuid],
		options: &RebuildOptions,
		stats: &mut RebuildStats,
	) -> Result<()> {
		// Serialize against concurrent single-entity writes for the whole
		// batch; ids are sorted so lock order is deterministic
		let mut ordered = chunk.to_vec();
		ordered.sort();
		let mut guards = Vec::with_capacity(ordered.len());
		for id in &ordered {
			guards.push(self.writer.lock(*id).await);
		}

		let collections = self
			.primary
			.get_by_ids(chunk)
			.await
			.map_err(IndexError::primary)?;
		if collections.len() < chunk.len() {
			// Deleted between classification and hydration
			stats.skipped += (chunk.len() - collections.len()) as u64;
		}

		let fields: Vec<String> = collections.iter().map(|c| c.id.to_string()).collect();
		let previous = self.store.hmget(&self.keys.summaries(), &fields).await?;

		let mut batch = WriteBatch::default();
		let mut batch_bytes = 0u64;
		let mut staged = 0u64;
		for (collection, prev_bytes) in collections.iter().zip(previous) {
			if collection.is_deleted() {
				stats.skipped += 1;
				continue;
			}
			let prev = prev_bytes
				.as_deref()
				.and_then(CollectionSummary::decode_lossy);
			match self
				.writer
				.stage(collection, prev.as_ref(), &mut batch, options.skip_preview_caching)
				.await
			{
				Ok(bytes) => {
					batch_bytes += bytes;
					staged += 1;
				}
				Err(e) => {
					stats.failed += 1;
					warn!(collection_id = %collection.id, "skipping collection: {e}");
				}
			}
		}

		match self.store.apply(batch).await {
			Ok(()) => {
				stats.rebuilt += staged;
				stats.peak_batch_bytes = stats.peak_batch_bytes.max(batch_bytes);
				debug!(staged, batch_bytes, "batch committed");
				Ok(())
			}
			Err(e) if e.is_unavailable() => Err(e.into()),
			Err(e) => {
				// Partial batch failure: record and let the run continue
				stats.failed += staged;
				warn!("batch write failed, continuing with next batch: {e}");
				Ok(())
			}
		}
		// guards, collections and staged buffers all drop here
	}

	/// Delete every key the engine owns, in bounded DEL batches
	async fn clear_all(&self) -> Result<()> {
		let keys = self.store.scan_keys(&self.keys.all_pattern()).await?;
		info!(keys = keys.len(), "clearing index");
		for chunk in keys.chunks(512) {
			let mut batch = WriteBatch::default();
			for key in chunk {
				batch.del(key.clone());
			}
			self.store.apply(batch).await?;
		}
		Ok(())
	}

	/// Record the singleton validity metadata after a completed full pass
	async fn write_meta(&self, total: u64) -> Result<()> {
		let mut batch = WriteBatch::default();
		batch.set(
			self.keys.last_full_rebuild(),
			Utc::now().to_rfc3339().into_bytes(),
		);
		batch.set(self.keys.total_indexed(), total.to_string().into_bytes());
		Ok(self.store.apply(batch).await?)
	}
}
