//! Recursive inlining of directives.
//!
//! Every directive is replaced by the flattened content of the file it names,
//! re-read from disk at the moment of reference. A file referenced twice is
//! inlined twice; a file that reaches itself again is a `CyclicReference`.

use crate::error::{AssetError, Result};
use crate::fs_utils::read_file_contents;
use crate::lexer::{Delimiters, Lexer, TokenKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a directive's file name is turned into a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Always relative to the base (source root) directory
    #[default]
    RelativeToBase,
    /// Relative to the directory of the file containing the directive
    RelativeToFile,
}

/// Flattens files by splicing in the content of every referenced file
#[derive(Debug, Clone)]
pub struct Inliner {
    base_dir: PathBuf,
    delimiters: Delimiters,
    mode: ResolveMode,
    keep_delimiters: bool,
}

impl Inliner {
    pub fn new(base_dir: impl Into<PathBuf>, delimiters: Delimiters, mode: ResolveMode) -> Self {
        Self {
            base_dir: base_dir.into(),
            delimiters,
            mode,
            keep_delimiters: false,
        }
    }

    /// Keep the directive delimiters around spliced content instead of
    /// dropping them.
    #[must_use]
    pub fn keep_delimiters(mut self, keep: bool) -> Self {
        self.keep_delimiters = keep;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Produces the fully flattened content of the file at `path`.
    ///
    /// # Errors
    ///
    /// - `AssetError::FileNotFound` if `path` or any referenced file is missing.
    /// - `AssetError::UnterminatedDirective` if any file in the tree has an
    ///   unclosed directive.
    /// - `AssetError::CyclicReference` if a file ends up including itself.
    /// - `AssetError::InvalidReference` for a directive with an empty name.
    pub fn inline_file(&self, path: &Path) -> Result<String> {
        let mut out = String::new();
        let mut chain = Vec::new();
        self.inline_path(path, &mut out, &mut chain)?;
        Ok(out)
    }

    /// Flattens text that did not come from a file. In `RelativeToFile` mode
    /// references resolve against `dir`.
    ///
    /// # Errors
    ///
    /// Same as [`Inliner::inline_file`].
    pub fn inline_str(&self, source: &str, dir: &Path) -> Result<String> {
        let mut out = String::new();
        let mut chain = Vec::new();
        self.inline_source(source, Path::new("<input>"), dir, &mut out, &mut chain)?;
        Ok(out)
    }

    fn inline_path(&self, path: &Path, out: &mut String, chain: &mut Vec<PathBuf>) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AssetError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => AssetError::at(path, e),
        })?;

        if let Some(first) = chain.iter().position(|p| p == &canonical) {
            let mut cycle = chain[first..].to_vec();
            cycle.push(canonical);
            return Err(AssetError::CyclicReference { chain: cycle });
        }

        debug!(path = %path.display(), depth = chain.len(), "inlining file");
        let source = read_file_contents(path)?;
        let dir = path.parent().unwrap_or(Path::new("."));

        chain.push(canonical);
        self.inline_source(&source, path, dir, out, chain)?;
        chain.pop();
        Ok(())
    }

    fn inline_source(
        &self,
        source: &str,
        origin: &Path,
        dir: &Path,
        out: &mut String,
        chain: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for token in Lexer::new(source, &self.delimiters) {
            match token.kind {
                TokenKind::Text => out.push_str(&token.value),
                TokenKind::LeftDelim | TokenKind::RightDelim => {
                    if self.keep_delimiters {
                        out.push_str(&token.value);
                    }
                }
                TokenKind::FileRef => {
                    if token.value.trim().is_empty() {
                        return Err(AssetError::InvalidReference {
                            reference: token.value.into_owned(),
                            path: origin.to_path_buf(),
                        });
                    }
                    let target = self.target(dir, &token.value);
                    self.inline_path(&target, out, chain)?;
                }
                TokenKind::Error => {
                    return Err(AssetError::UnterminatedDirective {
                        path: origin.to_path_buf(),
                        position: token.position,
                        message: token.value.into_owned(),
                    });
                }
                TokenKind::EndOfStream => break,
            }
        }
        Ok(())
    }

    fn target(&self, dir: &Path, name: &str) -> PathBuf {
        let name = name.trim_start_matches(['/', '\\']);
        match self.mode {
            ResolveMode::RelativeToBase => self.base_dir.join(name),
            ResolveMode::RelativeToFile => dir.join(name),
        }
    }
}
