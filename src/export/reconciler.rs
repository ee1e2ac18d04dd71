//! Merges a prior export manifest with live database records.
//!
//! The manifest of an earlier export carries informational copies of
//! child items that may have gone stale; where the caller supplies a
//! live record with the same identifier, the live record wins.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::domain::{ContentNode, ManifestDocument, MANIFEST_FILE};

use super::probe;

/// Index live nodes by identifier; the overlay and child resolution are
/// both keyed joins against this map
pub fn live_index(nodes: &[ContentNode]) -> HashMap<String, ContentNode> {
    nodes
        .iter()
        .map(|node| (node.identifier.clone(), node.clone()))
        .collect()
}

/// Overlay live database records onto a manifest's item list.
/// Non-collection items with a live counterpart are replaced wholesale;
/// collections and unmatched items keep the manifest copy.
pub fn overlay_live_children(items: &mut [ContentNode], live: &HashMap<String, ContentNode>) {
    for item in items.iter_mut() {
        if item.is_collection() {
            continue;
        }
        if let Some(db_node) = live.get(&item.identifier) {
            *item = db_node.clone();
        }
    }
}

/// Resolve a child referenced by a collection: the child's own manifest
/// wins, then the live database record. `None` means the child is missing
/// entirely and the caller records it as corrupt.
pub async fn resolve_child(
    content_dir: &Path,
    id: &str,
    live: &HashMap<String, ContentNode>,
) -> Option<ContentNode> {
    let manifest_path = content_dir.join(id).join(MANIFEST_FILE);
    match probe::read_json::<ManifestDocument>(&manifest_path).await {
        Ok(manifest) => {
            if let Some(item) = manifest.archive.items.into_iter().next() {
                return Some(item);
            }
            warn!(child = %id, "child manifest has no items, falling back to live record");
        }
        Err(error) => {
            warn!(child = %id, error = %error, "could not read child manifest, falling back to live record");
        }
    }
    live.get(id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn node(value: serde_json::Value) -> ContentNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_overlay_replaces_stale_leaf_items() {
        let mut items = vec![
            node(json!({
                "identifier": "do_col",
                "mimeType": "application/vnd.ekstep.content-collection",
                "name": "Collection",
            })),
            node(json!({
                "identifier": "do_1",
                "mimeType": "video/mp4",
                "name": "Stale name",
                "pkgVersion": 1,
            })),
            node(json!({
                "identifier": "do_2",
                "mimeType": "video/mp4",
                "name": "No live record",
            })),
        ];

        let live = live_index(&[node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "name": "Fresh name",
            "pkgVersion": 2,
        }))]);

        overlay_live_children(&mut items, &live);

        assert_eq!(items[1].name.as_deref(), Some("Fresh name"));
        assert_eq!(items[1].pkg_version, Some(json!(2)));
        // Collections and unmatched items keep the manifest copy
        assert_eq!(items[0].name.as_deref(), Some("Collection"));
        assert_eq!(items[2].name.as_deref(), Some("No live record"));
    }

    #[tokio::test]
    async fn test_resolve_child_prefers_manifest_on_disk() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("do_1");
        std::fs::create_dir(&folder).unwrap();
        let manifest = json!({
            "id": "content.archive",
            "ver": "1.0",
            "ts": "2024-01-01T00:00:00.000Z",
            "params": { "resmsgid": "0c2c6148-87bb-443c-9d41-b0e0a4bb8f3f" },
            "archive": {
                "count": 1,
                "ttl": 24,
                "items": [{
                    "identifier": "do_1",
                    "mimeType": "video/mp4",
                    "name": "From manifest",
                }],
            },
        });
        std::fs::write(
            folder.join("manifest.json"),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        let live = live_index(&[node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "name": "From database",
        }))]);

        let resolved = resolve_child(tmp.path(), "do_1", &live).await.unwrap();
        assert_eq!(resolved.name.as_deref(), Some("From manifest"));
    }

    #[tokio::test]
    async fn test_resolve_child_falls_back_to_live_record() {
        let tmp = TempDir::new().unwrap();
        let live = live_index(&[node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "name": "From database",
        }))]);

        let resolved = resolve_child(tmp.path(), "do_1", &live).await.unwrap();
        assert_eq!(resolved.name.as_deref(), Some("From database"));
    }

    #[tokio::test]
    async fn test_resolve_child_missing_everywhere() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve_child(tmp.path(), "do_ghost", &HashMap::new()).await;
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_unparsable_manifest_degrades_to_live_record() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("do_1");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("manifest.json"), b"not json").unwrap();

        let live = live_index(&[node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "name": "From database",
        }))]);

        let resolved = resolve_child(tmp.path(), "do_1", &live).await.unwrap();
        assert_eq!(resolved.name.as_deref(), Some("From database"));
    }
}
