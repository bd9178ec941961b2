//! Full generation runs.
//!
//! A run removes everything the previous run's manifest names, walks the
//! source tree, flattens and fingerprints every directive-bearing file, copies
//! everything else into the mirrored output tree and finally publishes a new
//! manifest. If any step fails, the fingerprinted outputs written so far are
//! removed again and no manifest is published.
//!
//! Runs against the same output directory must not overlap; callers are
//! expected to serialize them.

use crate::config::BundleConfig;
use crate::error::{AssetError, Result};
use crate::fs_utils::{mirror_path, relative_form, require_directory, to_slash};
use crate::inline::Inliner;
use crate::manifest::{BundleRecord, Manifest, content_addressed_name, digest_hex};
use crate::minify::{ContentType, Minify};
use crate::walk::{ResolvedPath, walk_files};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a successful generation run
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    /// Bundled files, in discovery order
    pub records: Vec<BundleRecord>,
    /// Files copied unchanged, as output paths
    pub copied: Vec<String>,
    /// Where the manifest was written
    pub manifest_path: PathBuf,
}

/// Runs a full, non-incremental generation.
///
/// # Errors
///
/// Any filesystem, scan, cycle or minification error aborts the run. See
/// [`AssetError`] for the taxonomy.
pub fn generate(config: &BundleConfig, minifier: &dyn Minify) -> Result<GenerateReport> {
    require_directory(&config.source_root)?;
    fs::create_dir_all(&config.output_root).map_err(|e| AssetError::at(&config.output_root, e))?;

    let manifest_path = Manifest::location(&config.output_root, &config.source_root);
    Manifest::remove_previous(&manifest_path, &config.output_root)?;

    info!(
        source = %config.source_root.display(),
        output = %config.output_root.display(),
        "generating assets"
    );

    let mirror = mirror_path(&config.output_root, &config.source_root);
    let files = walk_files(&config.source_root, Some(&mirror), config.ignore.as_ref())?;

    let mut run = Run::new(config, minifier);
    match run.process(&files, &manifest_path) {
        Ok(report) => Ok(report),
        Err(e) => {
            run.rollback();
            Err(e)
        }
    }
}

/// Bundles a single file into the output tree without touching the manifest.
///
/// # Errors
///
/// Same as the per-file part of [`generate`].
pub fn bundle_file(
    path: &Path,
    config: &BundleConfig,
    minifier: &dyn Minify,
) -> Result<BundleRecord> {
    let logical = match path.strip_prefix(&config.source_root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => PathBuf::from(path.file_name().ok_or_else(|| AssetError::FileNotFound {
            path: path.to_path_buf(),
        })?),
    };
    let file = ResolvedPath {
        path: path.to_path_buf(),
        logical,
        via_symlink: false,
    };
    Run::new(config, minifier).bundle(&file)
}

struct Run<'a> {
    config: &'a BundleConfig,
    minifier: &'a dyn Minify,
    inliner: Inliner,
    written: Vec<PathBuf>,
}

impl<'a> Run<'a> {
    fn new(config: &'a BundleConfig, minifier: &'a dyn Minify) -> Self {
        let inliner = Inliner::new(
            &config.source_root,
            config.delimiters.clone(),
            config.resolve_mode,
        );
        Self {
            config,
            minifier,
            inliner,
            written: Vec::new(),
        }
    }

    fn process(&mut self, files: &[ResolvedPath], manifest_path: &Path) -> Result<GenerateReport> {
        let mut manifest = Manifest::new();
        let mut copied = Vec::new();

        for file in files {
            if self.config.is_directive_bearing(&file.logical) {
                manifest.push(self.bundle(file)?);
            } else if let Some(output) = self.copy(file)? {
                copied.push(output);
            }
        }

        manifest.write_atomic(manifest_path)?;

        Ok(GenerateReport {
            records: manifest.records().to_vec(),
            copied,
            manifest_path: manifest_path.to_path_buf(),
        })
    }

    fn bundle(&mut self, file: &ResolvedPath) -> Result<BundleRecord> {
        debug!(
            path = %file.logical.display(),
            via_symlink = file.via_symlink,
            "bundling"
        );
        let flattened = self.inliner.inline_file(&file.path)?;
        let digest = digest_hex(flattened.as_bytes());

        let original = self.config.source_root.join(&file.logical);
        let new_path = content_addressed_name(
            &relative_form(&self.config.source_root).join(&file.logical),
            &digest,
        );
        let output = self.config.output_root.join(&new_path);

        let content = match ContentType::from_path(&file.logical) {
            Some(content_type) => self.minifier.minify(content_type, &flattened)?,
            None => flattened,
        };

        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir).map_err(|e| AssetError::at(dir, e))?;
        }
        fs::write(&output, content).map_err(|e| AssetError::at(&output, e))?;
        self.written.push(output);

        Ok(BundleRecord {
            original_path: to_slash(&original),
            new_path: to_slash(&new_path),
        })
    }

    /// Mirrors `file` into the output tree. Returns `None` when the mirrored
    /// location is the file itself, which happens when the output tree
    /// mirrors the source root onto itself.
    fn copy(&self, file: &ResolvedPath) -> Result<Option<String>> {
        let relative = relative_form(&self.config.source_root).join(&file.logical);
        let output = self.config.output_root.join(&relative);

        if fs::canonicalize(&output).is_ok_and(|real| real == file.path) {
            debug!(path = %file.logical.display(), "already in place");
            return Ok(None);
        }
        debug!(path = %file.logical.display(), "copying");

        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir).map_err(|e| AssetError::at(dir, e))?;
        }
        fs::copy(&file.path, &output).map_err(|e| AssetError::at(&file.path, e))?;
        Ok(Some(to_slash(&relative)))
    }

    fn rollback(&mut self) {
        for output in self.written.drain(..) {
            if let Err(e) = fs::remove_file(&output) {
                warn!(path = %output.display(), error = %e, "could not roll back output");
            }
        }
    }
}
