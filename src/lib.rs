//! # assetpack
//!
//! A static asset pipeline built around include directives. Source files pull
//! other files in with `//include(path)` (delimiters are configurable); the
//! pipeline flattens them, names every output after a hash of its content and
//! records the mapping in a manifest that templates later use to emit tags.
//!
//! ## Features
//!
//! - Pull-based directive lexer with configurable delimiters
//! - Recursive inlining, relative to the source root or to the including file
//! - Dependency-first file lists for development mode
//! - Content-addressed output names and a plain-text manifest
//! - Full rebuilds: previous outputs are removed before every run
//! - Cycle detection for includes and symlinked directories
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use assetpack::{BundleConfig, RunMode, TagRenderer, generate, locator_for, minify};
//!
//! let config = BundleConfig::new("assets", "public");
//! let report = generate(&config, minify::registry())?;
//! println!("bundled {} files", report.records.len());
//!
//! let tags = TagRenderer::new(locator_for(RunMode::Production, &config)?);
//! println!("{}", tags.script_tags("js/app.js")?);
//! # Ok::<(), assetpack::AssetError>(())
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Bundle ./assets into ./public
//! assetpack generate -i assets -o public
//!
//! # Show what a page would load in development mode
//! assetpack tags js/app.js -i assets --mode dev
//! ```

pub mod config;
pub mod deps;
pub mod error;
pub mod fs_utils;
pub mod generate;
pub mod inline;
pub mod lexer;
pub mod locator;
pub mod manifest;
pub mod minify;
pub mod walk;

// Re-export main types and functions for convenience
pub use config::{BundleConfig, RunMode};
pub use deps::DependencyResolver;
pub use error::{AssetError, Result};
pub use generate::{GenerateReport, bundle_file, generate};
pub use inline::{Inliner, ResolveMode};
pub use lexer::{Delimiters, Lexer, Reference, Token, TokenKind, find_references};
pub use locator::{DevelopmentLocator, Locate, ProductionLocator, TagRenderer, locator_for};
pub use manifest::{BundleRecord, Manifest};
pub use walk::{ResolvedPath, walk_files};
