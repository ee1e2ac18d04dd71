//! The `content.archive` manifest envelope written into every exported unit.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentNode;

/// Envelope id shared by every content manifest
pub const MANIFEST_ID: &str = "content.archive";

/// Manifest file name inside a content folder and inside the archive
pub const MANIFEST_FILE: &str = "manifest.json";

/// Hierarchy file name for collections
pub const HIERARCHY_FILE: &str = "hierarchy.json";

/// Versioned manifest envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub id: String,
    pub ver: String,
    /// RFC 3339, millisecond precision
    pub ts: String,
    pub params: ManifestParams,
    pub archive: ManifestArchive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestParams {
    pub resmsgid: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestArchive {
    pub count: usize,
    pub ttl: u32,
    pub items: Vec<ContentNode>,
}

impl ManifestDocument {
    /// Synthesize the manifest written alongside a single packaged item
    pub fn for_item(node: &ContentNode) -> Self {
        Self {
            id: MANIFEST_ID.to_string(),
            ver: node.pkg_version_label(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            params: ManifestParams {
                resmsgid: Uuid::new_v4(),
            },
            archive: ManifestArchive {
                count: 1,
                ttl: 24,
                items: vec![node.clone()],
            },
        }
    }

    /// First item of the archive: the authoritative record for the unit
    pub fn primary_item(&self) -> Option<&ContentNode> {
        self.archive.items.first()
    }
}
