//! Domain types for the ecar exporter.
//!
//! This module contains the core data structures:
//! - ContentNode: the unit being packaged, leaf or collection
//! - ManifestDocument: the `content.archive` envelope
//! - CorruptContentEntry: bookkeeping for skipped children

pub mod content;
pub mod manifest;

// Re-export commonly used types
pub use content::{
    ecar_file_name, ArtifactKind, ContentNode, CorruptContentEntry, CorruptReason,
    COLLECTION_MIMETYPE, UNTITLED_CONTENT,
};
pub use manifest::{ManifestArchive, ManifestDocument, HIERARCHY_FILE, MANIFEST_FILE};
