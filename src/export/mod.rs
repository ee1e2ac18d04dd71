//! The export pipeline: filesystem probes, validation, manifest
//! reconciliation, archive construction, and orchestration.
//!
//! Control flow runs Orchestrator -> (Reconciler | Validator) -> Archive
//! Builder, with the probes underneath both the validator and the
//! builder. One job processes its children strictly in sequence.

pub mod archive;
pub mod job;
pub mod probe;
pub mod reconciler;
pub mod validator;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, ArchiveError};
pub use job::{ExportJob, ExportResult, ECAR_EXTENSION};
pub use validator::ContentState;
