//! Content-addressed output naming and the build manifest.
//!
//! The manifest is plain text, one `original --> new` record per line, in the
//! order files were discovered. `new` is relative to the output root; served
//! URLs are that path rooted at `/`.

use crate::error::{AssetError, Result};
use crate::fs_utils::mirror_path;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Separator between the original and generated path on a manifest line
pub const SEPARATOR: &str = " --> ";
/// File name of the manifest inside the mirrored source directory
pub const MANIFEST_FILE: &str = "manifest.txt";

/// One bundled file: where it came from and where its output lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Source path, including the source root as given by the caller
    pub original_path: String,
    /// Output path relative to the output root
    pub new_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    records: Vec<BundleRecord>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic manifest location for a source root: the source root
    /// mirrored under the output root.
    pub fn location(output_root: &Path, source_root: &Path) -> PathBuf {
        mirror_path(output_root, source_root).join(MANIFEST_FILE)
    }

    pub fn push(&mut self, record: BundleRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[BundleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parses manifest text. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::MalformedManifest` for a line without the separator
    /// or one whose output path is absolute or climbs out of the output root.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || AssetError::MalformedManifest {
                path: path.to_path_buf(),
                line: index + 1,
            };
            let (original, new) = line.split_once(SEPARATOR).ok_or_else(malformed)?;
            if !stays_inside(new) {
                return Err(malformed());
            }
            records.push(BundleRecord {
                original_path: original.to_string(),
                new_path: new.to_string(),
            });
        }
        Ok(Self { records })
    }

    /// # Errors
    ///
    /// - `AssetError::FileNotFound` if there is no manifest at `path`.
    /// - `AssetError::MalformedManifest` if a line can't be parsed.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AssetError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => AssetError::at(path, e),
        })?;
        Self::parse(&content, path)
    }

    pub fn to_text(&self) -> String {
        self.records
            .iter()
            .map(|r| format!("{}{SEPARATOR}{}\n", r.original_path, r.new_path))
            .collect()
    }

    /// Writes the manifest through a temporary file in the same directory, so
    /// readers never observe a partially written manifest.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::PathIo` if the directory or file can't be written.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| AssetError::at(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AssetError::at(dir, e))?;
        tmp.write_all(self.to_text().as_bytes())
            .map_err(|e| AssetError::at(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| AssetError::at(path, e.error))?;

        info!(path = %path.display(), records = self.len(), "manifest written");
        Ok(())
    }

    /// Deletes every output named by the manifest at `path`, then the manifest
    /// itself. Outputs that are already gone are skipped. Returns how many
    /// outputs were removed.
    ///
    /// # Errors
    ///
    /// - `AssetError::MalformedManifest` if the manifest can't be parsed.
    /// - `AssetError::PathIo` if an existing output or the manifest can't be removed.
    pub fn remove_previous(path: &Path, output_root: &Path) -> Result<usize> {
        let manifest = match Self::read(path) {
            Ok(manifest) => manifest,
            Err(AssetError::FileNotFound { .. }) => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for record in manifest.records() {
            let output = output_root.join(&record.new_path);
            match fs::remove_file(&output) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %output.display(), "previous output already missing");
                }
                Err(e) => return Err(AssetError::at(output, e)),
            }
        }
        fs::remove_file(path).map_err(|e| AssetError::at(path, e))?;

        info!(manifest = %path.display(), removed, "removed previous generation");
        Ok(removed)
    }
}

/// Whether `new_path` names something strictly below the output root
fn stays_inside(new_path: &str) -> bool {
    let path = Path::new(new_path);
    path.components().any(|c| matches!(c, Component::Normal(_)))
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Lowercase hex SHA-256 of `content`
pub fn digest_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// `dir/name.ext` becomes `dir/name-<digest>.ext`
pub fn content_addressed_name(path: &Path, digest: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}-{digest}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{digest}"),
    };
    path.with_file_name(file_name)
}
