//! Source tree enumeration.
//!
//! Symlinked files and directories are followed. Each file keeps the logical
//! path it has in the tree as the caller sees it, next to the real path reads
//! should go through.

use crate::error::{AssetError, Result};
use crate::fs_utils::{require_directory, to_slash};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// A file discovered under the source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Real location of the file, symlinks resolved
    pub path: PathBuf,
    /// Location relative to the source root, through any symlinks
    pub logical: PathBuf,
    /// Whether a symlink was crossed to reach the file
    pub via_symlink: bool,
}

impl ResolvedPath {
    /// Logical path with `/` separators
    pub fn logical_str(&self) -> String {
        to_slash(&self.logical)
    }
}

/// Lists every file under `root` in a stable, name-sorted depth-first order.
///
/// Entries whose logical path matches `ignore` are skipped (directories with
/// everything below them). A directory whose real path is `exclude` is not
/// descended into.
///
/// # Errors
///
/// - `AssetError::NotADirectory` if `root` (or its link target) isn't a directory.
/// - `AssetError::SymlinkResolution` for a dangling symlink anywhere in the tree.
/// - `AssetError::CyclicReference` for a symlink pointing back at an ancestor.
pub fn walk_files(
    root: &Path,
    exclude: Option<&Path>,
    ignore: Option<&Regex>,
) -> Result<Vec<ResolvedPath>> {
    let read_root = require_directory(root)?;
    let canonical_root = fs::canonicalize(&read_root).map_err(|e| AssetError::at(root, e))?;
    let exclude = exclude.and_then(|p| fs::canonicalize(p).ok());

    let mut files = Vec::new();
    let mut entries = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = entries.next() {
        let entry = entry.map_err(walk_error)?;
        let logical = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let is_dir = entry.file_type().is_dir();

        if ignore.is_some_and(|re| re.is_match(&to_slash(&logical))) {
            trace!(path = %logical.display(), "ignored");
            if is_dir {
                entries.skip_current_dir();
            }
            continue;
        }

        let real = fs::canonicalize(entry.path()).map_err(|source| {
            if entry.path_is_symlink() {
                AssetError::SymlinkResolution {
                    path: entry.path().to_path_buf(),
                    source,
                }
            } else {
                AssetError::at(entry.path(), source)
            }
        })?;

        if is_dir {
            if exclude.as_ref() == Some(&real) {
                trace!(path = %logical.display(), "skipping output directory");
                entries.skip_current_dir();
            }
            continue;
        }

        let via_symlink = real != canonical_root.join(&logical);
        files.push(ResolvedPath {
            path: real,
            logical,
            via_symlink,
        });
    }

    Ok(files)
}

fn walk_error(err: walkdir::Error) -> AssetError {
    if let Some(ancestor) = err.loop_ancestor() {
        let chain = vec![
            ancestor.to_path_buf(),
            err.path().map(Path::to_path_buf).unwrap_or_default(),
        ];
        return AssetError::CyclicReference { chain };
    }

    let link = err
        .path()
        .filter(|p| fs::symlink_metadata(p).is_ok_and(|m| m.file_type().is_symlink()))
        .map(Path::to_path_buf);

    match (link, err.io_error().map(io::Error::kind)) {
        (Some(path), Some(kind)) => AssetError::SymlinkResolution {
            path,
            source: io::Error::new(kind, err.to_string()),
        },
        _ => AssetError::WalkDir(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree(files: &[&str]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for name in files {
            let path = temp_dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, *name).unwrap();
        }
        temp_dir
    }

    fn logical(files: &[ResolvedPath]) -> Vec<String> {
        files.iter().map(ResolvedPath::logical_str).collect()
    }

    #[test]
    fn test_walk_sorted_depth_first() {
        let dir = create_tree(&["b.js", "a/z.css", "a/b/c.js", "c.txt"]);
        let files = walk_files(dir.path(), None, None).unwrap();
        assert_eq!(logical(&files), vec!["a/b/c.js", "a/z.css", "b.js", "c.txt"]);
        assert!(files.iter().all(|f| !f.via_symlink));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = create_tree(&["file.js"]);
        let result = walk_files(&dir.path().join("file.js"), None, None);
        assert!(matches!(result, Err(AssetError::NotADirectory { .. })));
    }

    #[test]
    fn test_ignore_pattern() {
        let dir = create_tree(&["vendor/x.js", "vendor/deep/y.js", "app.js", "app.min.js"]);
        let ignore = Regex::new(r"^vendor|\.min\.js$").unwrap();
        let files = walk_files(dir.path(), None, Some(&ignore)).unwrap();
        assert_eq!(logical(&files), vec!["app.js"]);
    }

    #[test]
    fn test_exclude_directory() {
        let dir = create_tree(&["app.js", "dist/app-abc.js"]);
        let files = walk_files(dir.path(), Some(&dir.path().join("dist")), None).unwrap();
        assert_eq!(logical(&files), vec!["app.js"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_keeps_logical_path() {
        use std::os::unix::fs::symlink;

        let outside = create_tree(&["lib/util.js"]);
        let dir = create_tree(&["app.js"]);
        symlink(outside.path().join("lib"), dir.path().join("linked")).unwrap();

        let files = walk_files(dir.path(), None, None).unwrap();
        assert_eq!(logical(&files), vec!["app.js", "linked/util.js"]);

        let linked = &files[1];
        assert!(linked.via_symlink);
        assert_eq!(
            linked.path,
            outside.path().join("lib/util.js").canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file() {
        use std::os::unix::fs::symlink;

        let dir = create_tree(&["real/a.js"]);
        symlink(dir.path().join("real/a.js"), dir.path().join("alias.js")).unwrap();

        let files = walk_files(dir.path(), None, None).unwrap();
        assert_eq!(logical(&files), vec!["alias.js", "real/a.js"]);
        assert!(files[0].via_symlink);
        assert_eq!(files[0].path, files[1].path);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_fatal() {
        use std::os::unix::fs::symlink;

        let dir = create_tree(&["app.js"]);
        symlink(dir.path().join("missing.js"), dir.path().join("broken.js")).unwrap();

        let result = walk_files(dir.path(), None, None);
        assert!(matches!(result, Err(AssetError::SymlinkResolution { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_cyclic() {
        use std::os::unix::fs::symlink;

        let dir = create_tree(&["a/app.js"]);
        symlink(dir.path().join("a"), dir.path().join("a/again")).unwrap();

        let result = walk_files(dir.path(), None, None);
        assert!(matches!(result, Err(AssetError::CyclicReference { .. })));
    }
}
