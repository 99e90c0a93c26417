//! Artifact files on disk.
//!
//! Every persisted artifact starts with a `Document ID: <id>` header line and
//! a blank line. Reads strip the header, so what was written comes back
//! byte for byte.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RefinrError, Result};
use crate::id::generate_document_id;

const HEADER_PREFIX: &str = "Document ID: ";

/// Where artifact text goes
pub trait ArtifactStore: Send + Sync {
    /// Write `content` under `path` with a fresh document id header; returns the id
    fn write_artifact(&self, path: &Path, content: &str) -> Result<String>;

    /// Read the content back without its header
    fn read_artifact(&self, path: &Path) -> Result<String>;

    /// Write `content` verbatim (seed promotion, latest output)
    fn write_plain(&self, path: &Path, content: &str) -> Result<()>;
}

/// Filesystem store rooted at a directory. Relative paths resolve against
/// the root; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn write_file(&self, path: &Path, data: &str) -> Result<PathBuf> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RefinrError::PersistenceFailed(format!("create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(&full, data)
            .map_err(|e| RefinrError::PersistenceFailed(format!("write {}: {}", full.display(), e)))?;
        Ok(full)
    }
}

/// Prepend the document id header
pub fn with_header(id: &str, content: &str) -> String {
    format!("{}{}\n\n{}", HEADER_PREFIX, id, content)
}

/// Split a stored file into (document id, content). Files without a header
/// are returned whole.
pub fn split_header(raw: &str) -> (Option<&str>, &str) {
    if let Some(rest) = raw.strip_prefix(HEADER_PREFIX)
        && let Some((id, body)) = rest.split_once('\n')
    {
        let body = body.strip_prefix('\n').unwrap_or(body);
        return (Some(id.trim_end_matches('\r')), body);
    }
    (None, raw)
}

impl ArtifactStore for FsArtifactStore {
    fn write_artifact(&self, path: &Path, content: &str) -> Result<String> {
        let id = generate_document_id();
        let full = self.write_file(path, &with_header(&id, content))?;
        log::debug!("Saved {} with document id {}", full.display(), id);
        Ok(id)
    }

    fn read_artifact(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path);
        let raw = fs::read_to_string(&full)
            .map_err(|e| RefinrError::PersistenceFailed(format!("read {}: {}", full.display(), e)))?;
        Ok(split_header(&raw).1.to_string())
    }

    fn write_plain(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.write_file(path, content)?;
        log::debug!("Wrote {}", full.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_strips_header() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());
        let content = "fn main() {\n    println!(\"hi\");\n}\n";

        let id = store.write_artifact(Path::new("run/iteration_1/refined.txt"), content).unwrap();
        assert!(id.starts_with("doc-"));

        let raw = fs::read_to_string(temp.path().join("run/iteration_1/refined.txt")).unwrap();
        assert!(raw.starts_with(&format!("Document ID: {}\n\n", id)));

        let back = store.read_artifact(Path::new("run/iteration_1/refined.txt")).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn test_round_trip_preserves_leading_blank_lines() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());
        let content = "\n\nstarts with blank lines";
        store.write_artifact(Path::new("a.txt"), content).unwrap();
        assert_eq!(store.read_artifact(Path::new("a.txt")).unwrap(), content);
    }

    #[test]
    fn test_read_plain_file_unchanged() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());
        store.write_plain(Path::new("seed.txt"), "print('seed')").unwrap();
        assert_eq!(store.read_artifact(Path::new("seed.txt")).unwrap(), "print('seed')");
    }

    #[test]
    fn test_absolute_path_ignores_root() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());
        let target = other.path().join("out.md");

        store.write_plain(&target, "# Title").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "# Title");
    }

    #[test]
    fn test_read_missing_is_persistence_failed() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());
        let err = store.read_artifact(Path::new("missing.txt")).unwrap_err();
        assert_eq!(err.kind(), "persistence_failed");
    }

    #[test]
    fn test_split_header() {
        assert_eq!(split_header("Document ID: abc\n\nbody"), (Some("abc"), "body"));
        assert_eq!(split_header("no header"), (None, "no header"));
        assert_eq!(split_header("Document ID: only-line"), (None, "Document ID: only-line"));
    }
}
