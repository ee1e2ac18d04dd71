//! Content node metadata and export bookkeeping types.
//!
//! A `ContentNode` is the unit the exporter packages: either a leaf piece
//! of content or a collection referencing child identifiers. Nodes come
//! from two sources (a prior export manifest or a live database record)
//! and the exporter reconciles between them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mime type that marks a node as a collection
pub const COLLECTION_MIMETYPE: &str = "application/vnd.ekstep.content-collection";

/// Fallback label when a node carries no display name
pub const UNTITLED_CONTENT: &str = "Untitled content";

/// Characters stripped from a display name before it becomes a file name
const UNSAFE_NAME_CHARS: &str = "&/\\#,+()$~%.!@|\":*?<>{}";

/// A single content item, as stored in a manifest or supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    /// Unique content identifier
    pub identifier: String,

    /// Mime type; distinguishes collections from leaf content
    pub mime_type: String,

    /// Display name, used to derive the ecar file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Icon path relative to the content folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,

    /// Artifact path relative to the content folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,

    /// "online" content carries no local artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,

    /// Package version; producers write it as a number or a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_version: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,

    /// Child identifiers, present only on collections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_nodes: Option<Vec<String>>,

    /// Remaining manifest fields, carried through untouched so a
    /// re-written manifest loses no metadata
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ContentNode {
    /// Whether this node is a collection of other content
    pub fn is_collection(&self) -> bool {
        self.mime_type == COLLECTION_MIMETYPE
    }

    /// How this node's artifact reaches the archive, decided once so
    /// validation and packaging cannot disagree
    pub fn artifact_kind(&self) -> ArtifactKind {
        let Some(url) = self.artifact_url.as_deref() else {
            return ArtifactKind::None;
        };
        if self.content_disposition.as_deref() == Some("online") {
            return ArtifactKind::None;
        }
        match Path::new(url).extension().and_then(|ext| ext.to_str()) {
            Some("zip") => ArtifactKind::NestedArchive,
            _ => ArtifactKind::Direct,
        }
    }

    /// Package version as a manifest version label
    pub fn pkg_version_label(&self) -> String {
        match &self.pkg_version {
            Some(Value::String(version)) => version.clone(),
            Some(version) => version.to_string(),
            None => "1.0".to_string(),
        }
    }
}

/// How a node's artifact is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// No local artifact: none declared, or the content is online
    None,

    /// A plain file streamed into the archive as-is
    Direct,

    /// An unpacked directory bundle, re-zipped into a nested archive
    NestedArchive,
}

/// Why a node was left out of the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorruptReason {
    /// No directory on disk for the node's identifier
    ContentFolderMissing,

    /// The node declares an icon that is not in its folder
    AppIconMissing,

    /// A direct artifact file is absent
    ArtifactMissing,

    /// A bundle artifact's folder holds nothing beyond icon and manifest
    ZipArtifactMissing,

    /// Neither a manifest on disk nor a live record exists for the child
    ContentMissing,
}

impl std::fmt::Display for CorruptReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CorruptReason::ContentFolderMissing => "CONTENT_FOLDER_MISSING",
            CorruptReason::AppIconMissing => "APP_ICON_MISSING",
            CorruptReason::ArtifactMissing => "ARTIFACT_MISSING",
            CorruptReason::ZipArtifactMissing => "ZIP_ARTIFACT_MISSING",
            CorruptReason::ContentMissing => "CONTENT_MISSING",
        };
        write!(f, "{}", label)
    }
}

/// A child that was skipped, recorded for the caller alongside the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptContentEntry {
    pub id: String,
    pub reason: CorruptReason,
}

/// Derive the ecar file name from a display name, stripping characters
/// that are unsafe in file names. An absent or empty name falls back to
/// a fixed label.
pub fn ecar_file_name(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => name
            .chars()
            .filter(|c| !UNSAFE_NAME_CHARS.contains(*c))
            .collect(),
        _ => UNTITLED_CONTENT.to_string(),
    }
}
