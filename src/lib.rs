//! ecar-export - Offline content packaging pipeline
//!
//! Assembles a hierarchical tree of content assets (a parent item plus
//! zero or more children) into a single portable `.ecar` archive.
//!
//! # Architecture
//!
//! The exporter is built around a partial-failure model:
//! - Each child is validated against its on-disk folder before packaging
//! - Corrupt children are recorded and skipped, never aborting the job
//! - Stale manifest copies are overlaid with live database records
//! - Bundle artifacts are re-zipped into nested archives on the fly
//!
//! # Modules
//!
//! - `domain`: Data structures (ContentNode, ManifestDocument, CorruptContentEntry)
//! - `export`: The pipeline (probes, validator, reconciler, archive builder, job)
//!
//! # Usage
//!
//! Construct an [`ExportJob`] with the content base directory, the
//! destination directory, the parent node, and its child records, then
//! await [`ExportJob::export`]. The [`ExportResult`] reports the archive
//! size, the elapsed time, and every skipped child with its reason.

pub mod domain;
pub mod export;

// Re-export main types at crate root for convenience
pub use domain::{
    ecar_file_name, ArtifactKind, ContentNode, CorruptContentEntry, CorruptReason,
    ManifestDocument, COLLECTION_MIMETYPE, UNTITLED_CONTENT,
};
pub use export::{ArchiveBuilder, ArchiveError, ContentState, ExportJob, ExportResult};
