//! Incremental zip construction for ecar output.
//!
//! `ArchiveBuilder` records append operations while the orchestrator
//! walks the content tree, then performs the actual zip write on the
//! blocking pool when finalized. File entries are streamed with
//! `io::copy`, and a nested archive (a bundle artifact re-zipped on
//! export) is spooled through an anonymous temp file so a whole nested
//! artifact is never held in memory.

use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::task;
use tracing::debug;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Failures in the archive engine; every one of them is fatal to an
/// export, there is no retry
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open source {path:?}")]
    Source {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to stream entry {name}")]
    Stream {
        name: String,
        source: io::Error,
    },

    #[error("failed to add entry {name}")]
    Entry {
        name: String,
        source: ZipError,
    },

    #[error("failed to create destination {path:?}")]
    Destination {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to spool nested archive")]
    Spool(#[source] io::Error),

    #[error("failed to finalize archive")]
    Finalize(#[source] ZipError),

    #[error("archive write task was aborted")]
    TaskAborted,
}

enum Entry {
    FromPath { source: PathBuf, name: String },
    Buffer { bytes: Vec<u8>, name: String },
    Nested { archive: ArchiveBuilder, name: String },
    Tree { source: PathBuf, prefix: String },
    DirMarker { name: String },
}

/// An in-progress archive: appends record entries, `write_to` streams
/// them all into a zip at the destination
#[derive(Default)]
pub struct ArchiveBuilder {
    entries: Vec<Entry>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream a file from disk under an archive-relative name
    pub fn append_path(&mut self, source: impl Into<PathBuf>, name: impl Into<String>) {
        self.entries.push(Entry::FromPath {
            source: source.into(),
            name: name.into(),
        });
    }

    /// Write an in-memory buffer under a name
    pub fn append_buffer(&mut self, bytes: Vec<u8>, name: impl Into<String>) {
        self.entries.push(Entry::Buffer {
            bytes,
            name: name.into(),
        });
    }

    /// Attach a nested archive whose finalized bytes become a single
    /// entry of this archive. The nested handle is consumed; its bytes
    /// now belong to this archive.
    pub fn append_archive(&mut self, archive: ArchiveBuilder, name: impl Into<String>) {
        self.entries.push(Entry::Nested {
            archive,
            name: name.into(),
        });
    }

    /// Recursively add a whole directory under a prefix
    pub fn append_directory(&mut self, source: impl Into<PathBuf>, prefix: impl Into<String>) {
        self.entries.push(Entry::Tree {
            source: source.into(),
            prefix: prefix.into(),
        });
    }

    /// Zero-byte entry standing in for a directory that no file entry
    /// would otherwise create
    pub fn append_dir_marker(&mut self, name: impl Into<String>) {
        self.entries.push(Entry::DirMarker { name: name.into() });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write all recorded entries as a zip at `dest` and return the total
    /// bytes written. Runs on the blocking pool; a mid-stream error fails
    /// the whole archive.
    pub async fn write_to(self, dest: &Path) -> Result<u64, ArchiveError> {
        let dest = dest.to_path_buf();
        task::spawn_blocking(move || self.write_sync(&dest))
            .await
            .map_err(|_| ArchiveError::TaskAborted)?
    }

    fn write_sync(self, dest: &Path) -> Result<u64, ArchiveError> {
        debug!(entries = self.entries.len(), dest = %dest.display(), "writing archive");

        let file = File::create(dest).map_err(|err| ArchiveError::Destination {
            path: dest.to_path_buf(),
            source: err,
        })?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        self.write_entries(&mut zip)?;

        let mut out = zip.finish().map_err(ArchiveError::Finalize)?;
        // stream_position flushes the buffer, so this is the final size
        let size = out.stream_position().map_err(|err| ArchiveError::Destination {
            path: dest.to_path_buf(),
            source: err,
        })?;
        out.flush().map_err(|err| ArchiveError::Destination {
            path: dest.to_path_buf(),
            source: err,
        })?;

        Ok(size)
    }

    fn write_entries<W: Write + Seek>(self, zip: &mut ZipWriter<W>) -> Result<(), ArchiveError> {
        let options = FileOptions::default();

        for entry in self.entries {
            match entry {
                Entry::FromPath { source, name } => {
                    let mut reader = File::open(&source).map_err(|err| ArchiveError::Source {
                        path: source.clone(),
                        source: err,
                    })?;
                    zip.start_file(name.as_str(), options)
                        .map_err(|err| ArchiveError::Entry {
                            name: name.clone(),
                            source: err,
                        })?;
                    io::copy(&mut reader, zip)
                        .map_err(|err| ArchiveError::Stream { name, source: err })?;
                }
                Entry::Buffer { bytes, name } => {
                    zip.start_file(name.as_str(), options)
                        .map_err(|err| ArchiveError::Entry {
                            name: name.clone(),
                            source: err,
                        })?;
                    zip.write_all(&bytes)
                        .map_err(|err| ArchiveError::Stream { name, source: err })?;
                }
                Entry::Nested { archive, name } => {
                    let mut spool = tempfile::tempfile().map_err(ArchiveError::Spool)?;
                    {
                        let mut nested = ZipWriter::new(&mut spool);
                        archive.write_entries(&mut nested)?;
                        nested.finish().map_err(ArchiveError::Finalize)?;
                    }
                    spool.rewind().map_err(ArchiveError::Spool)?;
                    zip.start_file(name.as_str(), options)
                        .map_err(|err| ArchiveError::Entry {
                            name: name.clone(),
                            source: err,
                        })?;
                    io::copy(&mut spool, zip)
                        .map_err(|err| ArchiveError::Stream { name, source: err })?;
                }
                Entry::Tree { source, prefix } => {
                    add_tree(zip, &source, &prefix, options)?;
                }
                Entry::DirMarker { name } => {
                    zip.add_directory(name.as_str(), options)
                        .map_err(|err| ArchiveError::Entry { name, source: err })?;
                }
            }
        }

        Ok(())
    }
}

fn add_tree<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: FileOptions,
) -> Result<(), ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|err| ArchiveError::Source {
        path: dir.to_path_buf(),
        source: err,
    })?;

    for entry in entries {
        let entry = entry.map_err(|err| ArchiveError::Source {
            path: dir.to_path_buf(),
            source: err,
        })?;
        let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        let file_type = entry.file_type().map_err(|err| ArchiveError::Source {
            path: entry.path(),
            source: err,
        })?;

        if file_type.is_dir() {
            zip.add_directory(name.as_str(), options)
                .map_err(|err| ArchiveError::Entry {
                    name: name.clone(),
                    source: err,
                })?;
            add_tree(zip, &entry.path(), &name, options)?;
        } else {
            let mut reader = File::open(entry.path()).map_err(|err| ArchiveError::Source {
                path: entry.path(),
                source: err,
            })?;
            zip.start_file(name.as_str(), options)
                .map_err(|err| ArchiveError::Entry {
                    name: name.clone(),
                    source: err,
                })?;
            io::copy(&mut reader, zip)
                .map_err(|err| ArchiveError::Stream { name, source: err })?;
        }
    }

    Ok(())
}
