//! Dependency-first resolution of directives into logical paths.
//!
//! Instead of splicing content, the resolver walks the include graph of one
//! file and returns every file it transitively references, each listed after
//! all of its own prerequisites. Paths are logical: relative to the source
//! root, `/`-separated, independent of where symlinks point.

use crate::error::{AssetError, Result};
use crate::fs_utils::{join_logical, logical_parent, read_file_contents};
use crate::inline::ResolveMode;
use crate::lexer::{Delimiters, find_references};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Resolves include graphs against a live source tree
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    source_root: PathBuf,
    delimiters: Delimiters,
    mode: ResolveMode,
}

/// State scoped to one top-level `resolve` call
#[derive(Default)]
struct Walk {
    seen: HashSet<String>,
    chain: Vec<String>,
    ordered: Vec<String>,
}

impl DependencyResolver {
    pub fn new(source_root: impl Into<PathBuf>, delimiters: Delimiters, mode: ResolveMode) -> Self {
        Self {
            source_root: source_root.into(),
            delimiters,
            mode,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Lists every file `name` transitively references, dependencies first.
    /// `name` itself is not part of the result. Each logical path appears
    /// once, even when reached through several files.
    ///
    /// # Errors
    ///
    /// - `AssetError::FileNotFound` if `name` or a referenced file is missing.
    /// - `AssetError::UnterminatedDirective` for an unclosed directive.
    /// - `AssetError::CyclicReference` if a file reaches itself again.
    /// - `AssetError::PathTraversal` if a reference leaves the source root.
    pub fn resolve(&self, name: &str) -> Result<Vec<String>> {
        let logical = join_logical("", name)?;
        let mut walk = Walk::default();
        self.visit(&logical, &mut walk)?;
        debug!(name = %logical, count = walk.ordered.len(), "resolved dependencies");
        Ok(walk.ordered)
    }

    fn visit(&self, logical: &str, walk: &mut Walk) -> Result<()> {
        let path = self.source_root.join(logical);
        let source = read_file_contents(&path)?;

        walk.chain.push(logical.to_string());
        for reference in find_references(&source, &self.delimiters, &path)? {
            if reference.name.trim().is_empty() {
                return Err(AssetError::InvalidReference {
                    reference: reference.name,
                    path,
                });
            }
            let target = self.logical_target(logical, &reference.name)?;

            if let Some(first) = walk.chain.iter().position(|p| p == &target) {
                let chain = walk.chain[first..]
                    .iter()
                    .chain(std::iter::once(&target))
                    .map(PathBuf::from)
                    .collect();
                return Err(AssetError::CyclicReference { chain });
            }

            if !walk.seen.insert(target.clone()) {
                trace!(file = %logical, dependency = %target, "already resolved");
                continue;
            }

            self.visit(&target, walk)?;
            walk.ordered.push(target);
        }
        walk.chain.pop();

        Ok(())
    }

    fn logical_target(&self, current: &str, name: &str) -> Result<String> {
        match self.mode {
            ResolveMode::RelativeToBase => join_logical("", name),
            ResolveMode::RelativeToFile => join_logical(logical_parent(current), name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp_dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp_dir
    }

    fn resolver(dir: &TempDir, mode: ResolveMode) -> DependencyResolver {
        DependencyResolver::new(dir.path(), Delimiters::new("include(", ")"), mode)
    }

    fn position(list: &[String], name: &str) -> usize {
        list.iter().position(|p| p == name).unwrap()
    }

    #[test]
    fn test_no_dependencies() {
        let dir = create_tree(&[("a.js", "plain")]);
        let deps = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js").unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_chain_is_dependency_first() {
        let dir = create_tree(&[
            ("a.js", "include(b.js)"),
            ("b.js", "include(c.js)"),
            ("c.js", "C"),
        ]);
        let deps = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js").unwrap();
        assert_eq!(deps, vec!["c.js", "b.js"]);
    }

    #[test]
    fn test_siblings_keep_scan_order() {
        let dir = create_tree(&[
            ("a.js", "include(b.js)include(c.js)"),
            ("b.js", "include(d.js)"),
            ("c.js", ""),
            ("d.js", ""),
        ]);
        let deps = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js").unwrap();
        assert_eq!(deps, vec!["d.js", "b.js", "c.js"]);
    }

    #[test]
    fn test_direct_duplicate_listed_once() {
        let dir = create_tree(&[("a.js", "include(b.js)\ninclude(b.js)"), ("b.js", "")]);
        let deps = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js").unwrap();
        assert_eq!(deps, vec!["b.js"]);
    }

    #[test]
    fn test_shared_dependency_listed_once() {
        let dir = create_tree(&[
            ("a.js", "include(b.js)include(c.js)"),
            ("b.js", "include(d.js)"),
            ("c.js", "include(d.js)"),
            ("d.js", ""),
        ]);
        let deps = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js").unwrap();
        assert_eq!(deps.iter().filter(|p| *p == "d.js").count(), 1);
        assert_eq!(deps.len(), 3);
    }

    #[test]
    fn test_shared_dependency_still_precedes_every_dependent() {
        // b is listed first by a, but d needs it too
        let dir = create_tree(&[
            ("a.js", "include(b.js)include(c.js)"),
            ("b.js", ""),
            ("c.js", "include(d.js)"),
            ("d.js", "include(b.js)"),
        ]);
        let deps = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js").unwrap();
        assert!(position(&deps, "b.js") < position(&deps, "d.js"));
        assert!(position(&deps, "d.js") < position(&deps, "c.js"));
    }

    #[test]
    fn test_relative_to_file() {
        let dir = create_tree(&[
            ("js/app.js", "include(lib/util.js)"),
            ("js/lib/util.js", "include(../shared.js)"),
            ("js/shared.js", ""),
        ]);
        let deps = resolver(&dir, ResolveMode::RelativeToFile)
            .resolve("js/app.js")
            .unwrap();
        assert_eq!(deps, vec!["js/shared.js", "js/lib/util.js"]);
    }

    #[test]
    fn test_cycle_fails_fast() {
        let dir = create_tree(&[
            ("a.js", "include(b.js)"),
            ("b.js", "include(c.js)"),
            ("c.js", "include(a.js)"),
        ]);
        match resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js") {
            Err(AssetError::CyclicReference { chain }) => {
                let names: Vec<_> = chain.iter().map(|p| p.display().to_string()).collect();
                assert_eq!(names, vec!["a.js", "b.js", "c.js", "a.js"]);
            }
            other => panic!("expected cyclic reference, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = create_tree(&[("a.js", "include(nope.js)")]);
        let result = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js");
        assert!(matches!(result, Err(AssetError::FileNotFound { .. })));

        let result = resolver(&dir, ResolveMode::RelativeToBase).resolve("missing.js");
        assert!(matches!(result, Err(AssetError::FileNotFound { .. })));
    }

    #[test]
    fn test_unterminated_directive() {
        let dir = create_tree(&[("a.js", "include(b.js")]);
        let result = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js");
        assert!(matches!(result, Err(AssetError::UnterminatedDirective { .. })));
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = create_tree(&[("a.js", "include(../../etc/passwd)")]);
        let result = resolver(&dir, ResolveMode::RelativeToBase).resolve("a.js");
        assert!(matches!(result, Err(AssetError::PathTraversal { .. })));
    }

    #[test]
    fn test_reflects_current_disk_state() {
        let dir = create_tree(&[("a.js", "include(b.js)"), ("b.js", ""), ("c.js", "")]);
        let resolver = resolver(&dir, ResolveMode::RelativeToBase);
        assert_eq!(resolver.resolve("a.js").unwrap(), vec!["b.js"]);

        fs::write(dir.path().join("a.js"), "include(c.js)").unwrap();
        assert_eq!(resolver.resolve("a.js").unwrap(), vec!["c.js"]);
    }
}
