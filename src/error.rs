use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for assetpack operations
#[derive(Error, Debug)]
pub enum AssetError {
    /// IO error tied to a specific path
    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File not found error with specific path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Declared root or resolved symlink target is not a directory
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A symlink could not be resolved to a real path
    #[error("Error resolving symlink {path}: {source}")]
    SymlinkResolution {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Scan reached a line break or end of input inside a directive
    #[error("Unterminated directive in {path} at byte {position}: {message}")]
    UnterminatedDirective {
        path: PathBuf,
        position: usize,
        message: String,
    },

    /// Directive with no usable file name
    #[error("Invalid reference {reference:?} in {path}")]
    InvalidReference { reference: String, path: PathBuf },

    /// Logical path escapes the source root
    #[error("Path traversal detected (reference escapes the source root): {reference}")]
    PathTraversal { reference: String },

    /// Production lookup for a name missing from the manifest
    #[error("No manifest entry for asset: {name}")]
    UnresolvedReference { name: String },

    /// A file (directly or transitively) references itself
    #[error("Cyclic reference detected: {}", display_chain(.chain))]
    CyclicReference { chain: Vec<PathBuf> },

    /// Manifest line without the separator, or naming an output outside the output root
    #[error("Malformed manifest {path} at line {line}")]
    MalformedManifest { path: PathBuf, line: usize },

    /// External minifier rejected its input
    #[error("Minification failed for {content_type}: {message}")]
    Minify {
        content_type: String,
        message: String,
    },

    /// `WalkDir` error when traversing directories
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssetError>;

impl AssetError {
    /// Wraps an IO error with the path it happened on
    pub fn at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::PathIo {
            path: path.into(),
            source,
        }
    }
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AssetError::FileNotFound {
            path: PathBuf::from("/test/file.js"),
        };
        assert_eq!(format!("{err}"), "File not found: /test/file.js");

        let err = AssetError::NotADirectory {
            path: PathBuf::from("/test/file.js"),
        };
        assert_eq!(format!("{err}"), "Not a directory: /test/file.js");

        let err = AssetError::UnterminatedDirective {
            path: PathBuf::from("app.js"),
            position: 8,
            message: "unclosed directive".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Unterminated directive in app.js at byte 8: unclosed directive"
        );

        let err = AssetError::UnresolvedReference {
            name: "css/site.css".to_string(),
        };
        assert_eq!(format!("{err}"), "No manifest entry for asset: css/site.css");

        let err = AssetError::PathTraversal {
            reference: "../secret.js".to_string(),
        };
        assert!(format!("{err}").contains("Path traversal detected"));
    }

    #[test]
    fn test_cyclic_reference_display() {
        let err = AssetError::CyclicReference {
            chain: vec![
                PathBuf::from("a.js"),
                PathBuf::from("b.js"),
                PathBuf::from("a.js"),
            ],
        };
        assert_eq!(
            format!("{err}"),
            "Cyclic reference detected: a.js -> b.js -> a.js"
        );
    }

    #[test]
    fn test_error_at_keeps_path() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = AssetError::at("locked.css", io_err);
        assert!(matches!(err, AssetError::PathIo { ref path, .. } if path == &PathBuf::from("locked.css")));
        assert!(format!("{err}").starts_with("IO error at locked.css"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: AssetError = json_err.into();
        assert!(matches!(err, AssetError::Json(_)));
    }
}
