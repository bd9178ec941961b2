//! Runtime lookup of served asset paths.
//!
//! A [`Locate`] strategy is picked once per process from the [`RunMode`]:
//! production answers from the manifest of the last generation run,
//! development re-resolves includes from the live source tree on every call.
//! [`TagRenderer`] turns the located paths into reference tags.

use crate::config::{BundleConfig, RunMode};
use crate::deps::DependencyResolver;
use crate::error::{AssetError, Result};
use crate::fs_utils::{join_logical, relative_form, to_slash};
use crate::inline::ResolveMode;
use crate::lexer::Delimiters;
use crate::manifest::Manifest;
use crate::minify::ContentType;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Placeholder replaced by the served path in a tag template
pub const PLACEHOLDER: &str = "{path}";
pub const SCRIPT_TAG: &str = r#"<script type="text/javascript" src="{path}"></script>"#;
pub const STYLESHEET_TAG: &str = r#"<link type="text/css" rel="stylesheet" href="{path}">"#;

/// Maps a logical asset name to the URLs that must be referenced for it
pub trait Locate: Send + Sync {
    /// Served paths for `name`, in the order they must be referenced.
    ///
    /// # Errors
    ///
    /// Implementations fail when `name` can't be mapped to any output.
    fn locate(&self, name: &str) -> Result<Vec<String>>;
}

/// Answers lookups from a generation run's manifest
#[derive(Debug, Clone, Default)]
pub struct ProductionLocator {
    mapped: HashMap<String, String>,
}

impl ProductionLocator {
    /// Reads the manifest a generation run wrote for `source_root`.
    ///
    /// # Errors
    ///
    /// - `AssetError::FileNotFound` if no manifest exists yet.
    /// - `AssetError::MalformedManifest` if it can't be parsed.
    pub fn load(output_root: &Path, source_root: &Path) -> Result<Self> {
        let path = Manifest::location(output_root, source_root);
        let manifest = Manifest::read(&path)?;
        info!(manifest = %path.display(), records = manifest.len(), "loaded manifest");
        Ok(Self::from_manifest(&manifest, source_root))
    }

    /// Keys every record by its path relative to `source_root`
    pub fn from_manifest(manifest: &Manifest, source_root: &Path) -> Self {
        let root = to_slash(source_root);
        let mapped = manifest
            .records()
            .iter()
            .map(|record| {
                let logical = strip_root(&record.original_path, &root);
                (logical.to_string(), format!("/{}", record.new_path))
            })
            .collect();
        Self { mapped }
    }

    pub fn len(&self) -> usize {
        self.mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }
}

impl Locate for ProductionLocator {
    fn locate(&self, name: &str) -> Result<Vec<String>> {
        let logical = join_logical("", name)?;
        self.mapped
            .get(&logical)
            .map(|served| vec![served.clone()])
            .ok_or_else(|| AssetError::UnresolvedReference {
                name: name.to_string(),
            })
    }
}

fn strip_root<'a>(original: &'a str, root: &str) -> &'a str {
    if root.is_empty() {
        return original;
    }
    original
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(original)
}

/// Resolves includes against the source tree on every lookup
#[derive(Debug, Clone)]
pub struct DevelopmentLocator {
    resolver: DependencyResolver,
    url_prefix: String,
}

impl DevelopmentLocator {
    pub fn new(source_root: &Path, delimiters: Delimiters, mode: ResolveMode) -> Self {
        let prefix = to_slash(&relative_form(source_root));
        Self {
            resolver: DependencyResolver::new(source_root, delimiters, mode),
            url_prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("/{prefix}")
            },
        }
    }

    fn url(&self, logical: &str) -> String {
        format!("{}/{logical}", self.url_prefix)
    }
}

impl Locate for DevelopmentLocator {
    fn locate(&self, name: &str) -> Result<Vec<String>> {
        let logical = join_logical("", name)?;
        let mut files = self.resolver.resolve(&logical)?;
        files.push(logical);
        debug!(name, count = files.len(), "located development assets");
        Ok(files.iter().map(|f| self.url(f)).collect())
    }
}

/// Builds the locator strategy for `mode`.
///
/// # Errors
///
/// In production mode, fails if the manifest can't be loaded.
pub fn locator_for(mode: RunMode, config: &BundleConfig) -> Result<Box<dyn Locate>> {
    let locator: Box<dyn Locate> = match mode {
        RunMode::Production => Box::new(ProductionLocator::load(
            &config.output_root,
            &config.source_root,
        )?),
        RunMode::Development => Box::new(DevelopmentLocator::new(
            &config.source_root,
            config.delimiters.clone(),
            config.resolve_mode,
        )),
    };
    Ok(locator)
}

/// Renders reference tags for located assets
pub struct TagRenderer {
    locator: Box<dyn Locate>,
    script_template: String,
    stylesheet_template: String,
}

impl TagRenderer {
    pub fn new(locator: Box<dyn Locate>) -> Self {
        Self {
            locator,
            script_template: SCRIPT_TAG.to_string(),
            stylesheet_template: STYLESHEET_TAG.to_string(),
        }
    }

    /// Overrides the tag template for one content type. The template must
    /// contain [`PLACEHOLDER`] once.
    #[must_use]
    pub fn with_template(mut self, content_type: ContentType, template: impl Into<String>) -> Self {
        match content_type {
            ContentType::Script => self.script_template = template.into(),
            ContentType::Stylesheet => self.stylesheet_template = template.into(),
        }
        self
    }

    /// One tag per located path, concatenated in order.
    ///
    /// # Errors
    ///
    /// Propagates the locator's failure; nothing is rendered in that case.
    pub fn render(&self, content_type: ContentType, name: &str) -> Result<String> {
        let template = match content_type {
            ContentType::Script => &self.script_template,
            ContentType::Stylesheet => &self.stylesheet_template,
        };
        Ok(self
            .locator
            .locate(name)?
            .iter()
            .map(|path| template.replace(PLACEHOLDER, path))
            .collect())
    }

    /// # Errors
    ///
    /// See [`TagRenderer::render`].
    pub fn script_tags(&self, name: &str) -> Result<String> {
        self.render(ContentType::Script, name)
    }

    /// # Errors
    ///
    /// See [`TagRenderer::render`].
    pub fn stylesheet_tags(&self, name: &str) -> Result<String> {
        self.render(ContentType::Stylesheet, name)
    }
}
