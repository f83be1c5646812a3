//! Index engine error types

use crate::infrastructure::store::StoreError;
use crate::operations::indexing::rebuild::RebuildStats;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the index engine
#[derive(Error, Debug)]
pub enum IndexError {
	/// Sorted-set store operation failed
	#[error("store error: {0}")]
	Store(#[from] StoreError),

	/// A collection referenced by the index no longer exists or is
	/// soft-deleted in the primary store
	#[error("collection {0} is missing or deleted in the primary store")]
	InconsistentEntity(Uuid),

	/// A persisted summary or state record could not be (de)serialized
	#[error("serialization error: {0}")]
	Serialization(String),

	/// The primary store collaborator failed
	#[error("primary store error: {0}")]
	Primary(#[source] anyhow::Error),

	/// A rebuild was requested with a mode the scan path does not handle
	#[error("{0} is not a scan mode; route it through the operator surface")]
	NotAScanMode(crate::operations::indexing::rebuild::RebuildMode),

	/// A bulk rebuild was aborted by store unavailability mid-run.
	/// Already-committed batches remain valid; `stats` reflects the work
	/// completed before the abort.
	#[error("rebuild aborted after {} of {} collections: {source}", stats.rebuilt, stats.total)]
	RebuildAborted {
		stats: Box<RebuildStats>,
		#[source]
		source: StoreError,
	},
}

impl IndexError {
	pub fn primary(e: anyhow::Error) -> Self {
		Self::Primary(e)
	}

	/// True when the store itself is unreachable, as opposed to a bad
	/// command or data problem. Read paths use this to switch to the
	/// degraded primary-store fallback.
	pub fn is_store_unavailable(&self) -> bool {
		matches!(
			self,
			Self::Store(StoreError::Unavailable(_))
				| Self::RebuildAborted {
					source: StoreError::Unavailable(_),
					..
				}
		)
	}
}

/// Result alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;
