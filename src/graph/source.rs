//! Directory access used by page discovery.
//!
//! Discovery never touches the filesystem directly; it goes through
//! [`SourceDir`] so fixtures can be held in memory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Read-only view of the source tree.
pub trait SourceDir: Sync {
    /// Regular files directly under `dir`, in no particular order.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    fn is_file(&self, path: &Path) -> bool;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSource;

impl SourceDir for DiskSource {
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            // Follows symlinks, so a linked template still counts as a page.
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory tree for tests. Directories exist implicitly as file parents.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: std::collections::BTreeSet<PathBuf>,
    unreadable: Vec<PathBuf>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            unreadable: Vec::new(),
        }
    }

    /// Make `list_files(dir)` fail with `PermissionDenied`.
    pub fn deny(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unreadable.push(dir.into());
        self
    }
}

#[cfg(test)]
impl SourceDir for MemorySource {
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        if self.unreadable.iter().any(|d| d == dir) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        }
        let files: Vec<_> = self
            .files
            .iter()
            .filter(|f| f.parent() == Some(dir))
            .cloned()
            .collect();
        if self.files.iter().any(|f| f.starts_with(dir) && f != dir) {
            Ok(files)
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"))
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disk_source_lists_only_direct_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("home.ejs"), "").unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/nav.ejs"), "").unwrap();

        let files = DiskSource.list_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("home.ejs")]);
    }

    #[test]
    fn test_disk_source_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = DiskSource.list_files(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_source() {
        let src = MemorySource::new(["/p/home.ejs", "/p/sub/x.ejs"]).deny("/locked");

        let files = src.list_files(Path::new("/p")).unwrap();
        assert_eq!(files, vec![PathBuf::from("/p/home.ejs")]);
        assert!(src.is_file(Path::new("/p/sub/x.ejs")));
        assert!(!src.is_file(Path::new("/p/sub")));
        assert!(src.list_files(Path::new("/missing")).is_err());
        assert_eq!(
            src.list_files(Path::new("/locked")).unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
    }
}
