use crate::error::{AssetError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Reads the contents of a file at the given path
///
/// # Errors
///
/// - `AssetError::FileNotFound` if the path doesn't exist or isn't a file.
/// - `AssetError::PathIo` if there's an error reading the file.
pub fn read_file_contents(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(AssetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    fs::read_to_string(path).map_err(|e| AssetError::at(path, e))
}

/// Requires `path` to be a directory, following a symlink if it is one.
/// Returns the path reads should use.
///
/// # Errors
///
/// - `AssetError::SymlinkResolution` if `path` is a dangling or looping link.
/// - `AssetError::NotADirectory` if the (resolved) target isn't a directory.
pub fn require_directory(path: &Path) -> Result<PathBuf> {
    let meta = fs::symlink_metadata(path).map_err(|e| AssetError::at(path, e))?;

    if meta.file_type().is_symlink() {
        let target = fs::canonicalize(path).map_err(|source| AssetError::SymlinkResolution {
            path: path.to_path_buf(),
            source,
        })?;
        if !target.is_dir() {
            return Err(AssetError::NotADirectory { path: target });
        }
        return Ok(target);
    }

    if !meta.is_dir() {
        return Err(AssetError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(path.to_path_buf())
}

/// Joins a file name onto a logical (source-root relative, `/`-separated)
/// directory, resolving `.` and `..` lexically.
///
/// # Errors
///
/// Returns `AssetError::PathTraversal` if the result would leave the root.
pub fn join_logical(dir: &str, name: &str) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();
    let name = name.replace('\\', "/");

    // a leading slash anchors the name at the source root
    let base = if name.starts_with('/') { "" } else { dir };

    for segment in base.split('/').chain(name.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(AssetError::PathTraversal {
                        reference: name.to_string(),
                    });
                }
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Parent directory of a logical path (`""` for top-level files)
pub fn logical_parent(logical: &str) -> &str {
    logical.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Renders a path with `/` separators, dropping any `./` components
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::CurDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative form of `path` suitable for nesting under an output directory:
/// roots, prefixes and `.` components are dropped, `..` is folded lexically
/// and never climbs above the start.
pub fn relative_form(path: &Path) -> PathBuf {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                relative.pop();
            }
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }
    relative
}

/// Location of `path` mirrored under `output_root`
pub fn mirror_path(output_root: &Path, path: &Path) -> PathBuf {
    output_root.join(relative_form(path))
}
