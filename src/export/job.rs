//! Export orchestration: drives validation, reconciliation, and archive
//! construction for one export request.
//!
//! A job is single use. The caller supplies the parent node and its
//! child records; the job walks the tree, records corrupt children
//! without aborting, and finalizes one ecar file at the destination.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    ecar_file_name, ArtifactKind, ContentNode, CorruptContentEntry, CorruptReason,
    ManifestDocument, HIERARCHY_FILE, MANIFEST_FILE,
};

use super::archive::ArchiveBuilder;
use super::probe;
use super::reconciler;
use super::validator::{self, ContentState};

/// File extension of the exported archive
pub const ECAR_EXTENSION: &str = "ecar";

/// Aggregated outcome of a successful export
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    /// Total bytes written to the ecar file
    pub ecar_size: u64,

    /// Elapsed seconds from job construction to destination close
    pub time_taken: f64,

    /// Children left out of the archive, in discovery order
    pub skipped_content: Vec<CorruptContentEntry>,

    /// Sanitized content name the file is named after
    pub name: String,

    pub ecar_file_path: PathBuf,
}

/// A single export request: one parent, its caller-supplied children,
/// one archive, one append-only corrupt list
pub struct ExportJob {
    content_dir: PathBuf,
    dest_dir: PathBuf,
    parent: ContentNode,
    children: Vec<ContentNode>,
    archive: ArchiveBuilder,
    corrupt: Vec<CorruptContentEntry>,
    started: Instant,
}

impl ExportJob {
    /// Create a job for one parent and its caller-supplied children.
    /// `content_dir` is the base folder holding one directory per content
    /// identifier; `dest_dir` receives the finished ecar file.
    pub fn new(
        content_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        parent: ContentNode,
        children: Vec<ContentNode>,
    ) -> Self {
        Self {
            content_dir: content_dir.into(),
            dest_dir: dest_dir.into(),
            parent,
            children,
            archive: ArchiveBuilder::new(),
            corrupt: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Run the export to completion. Individually corrupt children are
    /// recorded in the result and skipped; only archive-level failures
    /// and unexpected errors fail the job as a whole.
    #[instrument(skip(self), fields(parent = %self.parent.identifier, mime_type = %self.parent.mime_type))]
    pub async fn export(mut self) -> Result<ExportResult> {
        // The name comes from the caller-supplied node, even when a prior
        // manifest later overrides the rest of the parent record
        let name = ecar_file_name(self.parent.name.as_deref());
        info!(name = %name, "starting content export");

        if self.parent.is_collection() {
            self.export_collection().await?;
        } else {
            self.parent.visibility = Some("Default".to_string());
            let parent = self.parent.clone();
            self.package_content(&parent, false).await?;
        }

        self.finalize(name).await
    }

    async fn export_collection(&mut self) -> Result<()> {
        let manifest_path = self
            .content_dir
            .join(&self.parent.identifier)
            .join(MANIFEST_FILE);
        let mut manifest: ManifestDocument =
            probe::read_json(&manifest_path).await.with_context(|| {
                format!(
                    "Failed to load collection manifest for {}",
                    self.parent.identifier
                )
            })?;

        // Item 0 of the prior export is the authoritative collection record
        self.parent = manifest.primary_item().cloned().with_context(|| {
            format!(
                "Collection manifest for {} has no items",
                self.parent.identifier
            )
        })?;

        if let Some(icon) = self.parent.app_icon.clone() {
            let parent_id = self.parent.identifier.clone();
            self.append_icon(&parent_id, &icon, "");
        }

        let live = reconciler::live_index(&self.children);
        reconciler::overlay_live_children(&mut manifest.archive.items, &live);
        self.archive
            .append_buffer(serde_json::to_vec(&manifest)?, MANIFEST_FILE);

        let hierarchy = self
            .content_dir
            .join(&self.parent.identifier)
            .join(HIERARCHY_FILE);
        if probe::path_exists(&hierarchy).await {
            self.archive.append_path(hierarchy, HIERARCHY_FILE);
        }

        self.export_children(&live).await
    }

    async fn export_children(&mut self, live: &HashMap<String, ContentNode>) -> Result<()> {
        let child_ids = match self.parent.child_nodes.clone() {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                debug!(parent = %self.parent.identifier, "collection has no child nodes to export");
                return Ok(());
            }
        };

        for child_id in child_ids {
            match reconciler::resolve_child(&self.content_dir, &child_id, live).await {
                Some(node) => self.package_content(&node, true).await?,
                None => self.corrupt.push(CorruptContentEntry {
                    id: child_id,
                    reason: CorruptReason::ContentMissing,
                }),
            }
        }

        Ok(())
    }

    /// Validate a node and append its manifest, icon, and artifact to the
    /// archive. Children live under `<identifier>/`, the parent at the root.
    async fn package_content(&mut self, node: &ContentNode, child: bool) -> Result<()> {
        match validator::validate(&self.content_dir, node).await? {
            ContentState::Corrupt(reason) => {
                warn!(content = %node.identifier, reason = %reason, "skipping corrupt content");
                self.corrupt.push(CorruptContentEntry {
                    id: node.identifier.clone(),
                    reason,
                });
                return Ok(());
            }
            ContentState::Valid => {}
        }

        let base = if child {
            format!("{}/", node.identifier)
        } else {
            String::new()
        };
        if child {
            self.archive.append_dir_marker(node.identifier.as_str());
        }

        self.archive.append_buffer(
            serde_json::to_vec(&ManifestDocument::for_item(node))?,
            format!("{base}{MANIFEST_FILE}"),
        );

        if let Some(icon) = node.app_icon.as_deref() {
            self.append_icon(&node.identifier, icon, &base);
        }

        match node.artifact_kind() {
            ArtifactKind::None => {}
            ArtifactKind::Direct => {
                let url = node.artifact_url.as_deref().unwrap_or_default();
                if let Some(dir) = probe::relative_parent(url) {
                    self.archive.append_dir_marker(format!("{base}{dir}"));
                }
                let source = self
                    .content_dir
                    .join(&node.identifier)
                    .join(probe::file_name(url));
                self.archive.append_path(source, format!("{base}{url}"));
            }
            ArtifactKind::NestedArchive => {
                let url = node.artifact_url.as_deref().unwrap_or_default().to_string();
                if let Some(dir) = probe::relative_parent(&url) {
                    self.archive.append_dir_marker(format!("{base}{dir}"));
                }
                self.package_zip_artifact(node, &base, &url).await?;
            }
        }

        Ok(())
    }

    /// Re-zip a directory-style bundle into a nested archive appended
    /// under the node's declared artifact path. The nested archive is an
    /// independent handle; appending hands its bytes to the parent.
    async fn package_zip_artifact(&mut self, node: &ContentNode, base: &str, url: &str) -> Result<()> {
        let folder = self.content_dir.join(&node.identifier);
        let entries = probe::read_dir_names(&folder).await?;

        let mut nested = ArchiveBuilder::new();
        for entry in entries {
            if !validator::is_bundle_entry(&entry, node.app_icon.as_deref()) {
                continue;
            }
            let path = folder.join(&entry);
            let meta = tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("Failed to stat {}", path.display()))?;
            if meta.is_dir() {
                nested.append_directory(path, entry);
            } else {
                nested.append_path(path, entry);
            }
        }

        debug!(content = %node.identifier, entries = nested.len(), "re-zipping bundle artifact");
        self.archive.append_archive(nested, format!("{base}{url}"));
        Ok(())
    }

    fn append_icon(&mut self, node_id: &str, icon: &str, base: &str) {
        if let Some(dir) = probe::relative_parent(icon) {
            self.archive.append_dir_marker(format!("{base}{dir}"));
        }
        let source = self.content_dir.join(node_id).join(probe::file_name(icon));
        self.archive.append_path(source, format!("{base}{icon}"));
    }

    async fn finalize(self, name: String) -> Result<ExportResult> {
        let ExportJob {
            dest_dir,
            archive,
            corrupt,
            started,
            ..
        } = self;

        let ecar_file_path = dest_dir.join(format!("{name}.{ECAR_EXTENSION}"));
        let ecar_size = archive
            .write_to(&ecar_file_path)
            .await
            .with_context(|| format!("Failed to write ecar to {}", ecar_file_path.display()))?;

        let result = ExportResult {
            ecar_size,
            time_taken: started.elapsed().as_secs_f64(),
            skipped_content: corrupt,
            name,
            ecar_file_path,
        };
        info!(
            size = result.ecar_size,
            skipped = result.skipped_content.len(),
            path = %result.ecar_file_path.display(),
            "ecar exported successfully"
        );
        Ok(result)
    }
}
