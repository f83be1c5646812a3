//! Index maintenance operations
//!
//! - Per-collection writes with explicit scope-move handling
//! - Change detection via persisted index state
//! - Memory-bounded bulk rebuilds
//! - Bidirectional consistency verification with optional repair

pub mod preview;
pub mod rebuild;
pub mod state;
pub mod verify;
pub mod writer;

pub use preview::{FilePreviewSource, PreviewSource};
pub use rebuild::{RebuildMode, RebuildOptions, RebuildOrchestrator, RebuildStats};
pub use state::{IndexState, StateTracker};
pub use verify::{ConsistencyVerifier, VerifyResult};
pub use writer::{IndexWriter, ScopeChange};
