//! Minification boundary.
//!
//! The bundler never minifies by itself: it hands the flattened content and
//! its content type to whatever [`Minify`] implementation it was given. The
//! process-wide [`registry`] is initialized once and is read-only afterwards.

use crate::error::{AssetError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Kind of asset, as far as minification and tag rendering are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Script,
    Stylesheet,
}

impl ContentType {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "js" | "mjs" => Some(Self::Script),
            "css" => Some(Self::Stylesheet),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Script => "text/javascript",
            Self::Stylesheet => "text/css",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Capability handed to the bundler for shrinking output
pub trait Minify: Send + Sync {
    /// # Errors
    ///
    /// Returns `AssetError::Minify` when the input can't be minified.
    fn minify(&self, content_type: ContentType, input: &str) -> Result<String>;
}

/// Leaves every input untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Minify for Passthrough {
    fn minify(&self, _content_type: ContentType, input: &str) -> Result<String> {
        Ok(input.to_string())
    }
}

type MinifyFn = Box<dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync>;

/// Minifiers keyed by content type. Types without a registered minifier pass
/// through unchanged.
#[derive(Default)]
pub struct MinifierRegistry {
    minifiers: HashMap<ContentType, MinifyFn>,
}

impl MinifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<F>(mut self, content_type: ContentType, minifier: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.minifiers.insert(content_type, Box::new(minifier));
        self
    }
}

impl fmt::Debug for MinifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.minifiers.keys()).finish()
    }
}

impl Minify for MinifierRegistry {
    fn minify(&self, content_type: ContentType, input: &str) -> Result<String> {
        match self.minifiers.get(&content_type) {
            Some(minifier) => minifier(input).map_err(|message| AssetError::Minify {
                content_type: content_type.mime().to_string(),
                message,
            }),
            None => Ok(input.to_string()),
        }
    }
}

static REGISTRY: OnceLock<MinifierRegistry> = OnceLock::new();

/// Installs the process-wide registry. Returns `false` (and drops `registry`)
/// if one was already installed or lazily created by [`registry`].
pub fn install(registry: MinifierRegistry) -> bool {
    REGISTRY.set(registry).is_ok()
}

/// The process-wide registry, created empty on first use if nothing was
/// installed before.
pub fn registry() -> &'static MinifierRegistry {
    REGISTRY.get_or_init(MinifierRegistry::new)
}
