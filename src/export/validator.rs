//! On-disk completeness checks for a content node.
//!
//! Decides whether a node can be packaged at all, and classifies why not
//! when it cannot. Corruption here is data for the caller, not an error;
//! only an unreadable existing directory propagates as one.

use std::path::Path;

use anyhow::Result;

use crate::domain::{ArtifactKind, ContentNode, CorruptReason, MANIFEST_FILE};

use super::probe;

/// Outcome of validating a node against its content folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    Valid,
    Corrupt(CorruptReason),
}

/// Whether a content-folder entry belongs to the node's zip bundle.
/// The app icon and the manifest ship separately and are not bundle
/// payload; icon matching is by containment in the declared icon path.
pub fn is_bundle_entry(entry: &str, app_icon: Option<&str>) -> bool {
    if entry == MANIFEST_FILE {
        return false;
    }
    !app_icon.map_or(false, |icon| icon.contains(entry))
}

/// Decide whether a node's on-disk representation is complete enough to
/// export. Checks run in a fixed order: content folder, then app icon,
/// then artifact. A missing folder always wins over a missing icon, and
/// the icon is checked even for artifact-less content.
pub async fn validate(content_dir: &Path, node: &ContentNode) -> Result<ContentState> {
    let folder = content_dir.join(&node.identifier);
    if !probe::path_exists(&folder).await {
        return Ok(ContentState::Corrupt(CorruptReason::ContentFolderMissing));
    }

    if let Some(icon) = node.app_icon.as_deref() {
        if !probe::path_exists(&folder.join(probe::file_name(icon))).await {
            return Ok(ContentState::Corrupt(CorruptReason::AppIconMissing));
        }
    }

    match node.artifact_kind() {
        ArtifactKind::None => Ok(ContentState::Valid),
        ArtifactKind::Direct => {
            let url = node.artifact_url.as_deref().unwrap_or_default();
            if probe::path_exists(&folder.join(probe::file_name(url))).await {
                Ok(ContentState::Valid)
            } else {
                Ok(ContentState::Corrupt(CorruptReason::ArtifactMissing))
            }
        }
        ArtifactKind::NestedArchive => {
            let entries = probe::read_dir_names(&folder).await?;
            let has_payload = entries
                .iter()
                .any(|entry| is_bundle_entry(entry, node.app_icon.as_deref()));
            if has_payload {
                Ok(ContentState::Valid)
            } else {
                Ok(ContentState::Corrupt(CorruptReason::ZipArtifactMissing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn node(value: serde_json::Value) -> ContentNode {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_missing_folder_wins_over_missing_icon() {
        let tmp = TempDir::new().unwrap();
        let content = node(json!({
            "identifier": "do_gone",
            "mimeType": "video/mp4",
            "appIcon": "logo.png",
        }));

        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(
            state,
            ContentState::Corrupt(CorruptReason::ContentFolderMissing)
        );
    }

    #[tokio::test]
    async fn test_missing_icon_reported_for_artifact_less_content() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("do_1")).unwrap();
        let content = node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "appIcon": "logo.png",
        }));

        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(state, ContentState::Corrupt(CorruptReason::AppIconMissing));
    }

    #[tokio::test]
    async fn test_direct_artifact_must_exist() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("do_1")).unwrap();
        let content = node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "artifactUrl": "video.mp4",
        }));

        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(state, ContentState::Corrupt(CorruptReason::ArtifactMissing));

        std::fs::write(tmp.path().join("do_1").join("video.mp4"), b"x").unwrap();
        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(state, ContentState::Valid);
    }

    #[tokio::test]
    async fn test_online_content_is_valid_without_artifact() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("do_1")).unwrap();
        let content = node(json!({
            "identifier": "do_1",
            "mimeType": "video/mp4",
            "artifactUrl": "https://example.com/play.mp4",
            "contentDisposition": "online",
        }));

        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(state, ContentState::Valid);
    }

    #[tokio::test]
    async fn test_zip_bundle_needs_payload_beyond_icon_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("do_1");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("manifest.json"), b"{}").unwrap();
        std::fs::write(folder.join("logo.png"), b"png").unwrap();

        let content = node(json!({
            "identifier": "do_1",
            "mimeType": "application/vnd.ekstep.html-archive",
            "appIcon": "logo.png",
            "artifactUrl": "artifact.zip",
        }));

        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(
            state,
            ContentState::Corrupt(CorruptReason::ZipArtifactMissing)
        );

        std::fs::write(folder.join("index.html"), b"<html>").unwrap();
        let state = validate(tmp.path(), &content).await.unwrap();
        assert_eq!(state, ContentState::Valid);
    }

    #[test]
    fn test_bundle_entry_exclusions() {
        assert!(!is_bundle_entry("manifest.json", None));
        assert!(!is_bundle_entry("logo.png", Some("logo.png")));
        // Containment match covers the icon's directory component too
        assert!(!is_bundle_entry("assets", Some("assets/logo.png")));
        assert!(is_bundle_entry("index.html", Some("logo.png")));
    }
}
