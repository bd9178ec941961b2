use crate::inline::ResolveMode;
use crate::lexer::Delimiters;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Extensions whose files carry directives unless configured otherwise
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".css"];

/// Which asset locator strategy to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resolve includes from the live source tree on every lookup
    Development,
    /// Serve the fingerprinted outputs recorded in the manifest
    Production,
}

/// Configuration for a generation run
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Directory tree to bundle
    pub source_root: PathBuf,
    /// Directory the mirrored tree is written under
    pub output_root: PathBuf,
    /// Directive-bearing extensions, in `.ext` form
    pub extensions: BTreeSet<String>,
    /// Directive delimiters
    pub delimiters: Delimiters,
    /// How directive file names are resolved
    pub resolve_mode: ResolveMode,
    /// Entries whose logical path matches are skipped entirely
    pub ignore: Option<Regex>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            output_root: PathBuf::from("."),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            delimiters: Delimiters::default(),
            resolve_mode: ResolveMode::default(),
            ignore: None,
        }
    }
}

impl BundleConfig {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            ..Self::default()
        }
    }

    /// Replaces the extension set; entries are normalized to `.ext` form.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .filter_map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    #[must_use]
    pub fn with_resolve_mode(mut self, mode: ResolveMode) -> Self {
        self.resolve_mode = mode;
        self
    }

    #[must_use]
    pub fn with_ignore(mut self, ignore: Option<Regex>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Whether a file at `path` gets bundled rather than copied
    pub fn is_directive_bearing(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&format!(".{e}")))
    }
}

/// Normalizes `js`, `.js` and ` .js ` to `.js`; empty input yields `None`.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{trimmed}"))
    }
}

/// Parses a comma separated extension list such as `.js,.css`
pub fn parse_extension_list(list: &str) -> BTreeSet<String> {
    list.split(',').filter_map(normalize_extension).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = BundleConfig::default();
        assert!(config.extensions.contains(".js"));
        assert!(config.extensions.contains(".css"));
        assert_eq!(config.resolve_mode, ResolveMode::RelativeToBase);
        assert_eq!(config.delimiters, Delimiters::default());
        assert!(config.ignore.is_none());
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("js").as_deref(), Some(".js"));
        assert_eq!(normalize_extension(".css").as_deref(), Some(".css"));
        assert_eq!(normalize_extension("  .txt ").as_deref(), Some(".txt"));
        assert_eq!(normalize_extension(""), None);
        assert_eq!(normalize_extension("."), None);
    }

    #[test]
    fn test_parse_extension_list() {
        let set = parse_extension_list(".js, css,,.txt");
        assert_eq!(set.len(), 3);
        assert!(set.contains(".css"));
        assert!(parse_extension_list(" , ").is_empty());
    }

    #[test]
    fn test_is_directive_bearing() {
        let config = BundleConfig::default().with_extensions(["txt"]);
        assert!(config.is_directive_bearing(Path::new("a/b.txt")));
        assert!(!config.is_directive_bearing(Path::new("a/b.js")));
        assert!(!config.is_directive_bearing(Path::new("Makefile")));
    }
}
