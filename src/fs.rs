//! Output file system
//!
//! The pass only needs to list, read and overwrite files below the build
//! output directory. `DiskFs` does that on the real file system with atomic
//! writes; `MemoryFs` backs hosts that keep the build in memory, and tests.

use crate::error::{Result, TransformError};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

pub trait OutputFs: Sync {
    /// Regular files below `dir`, recursively, ordered by path.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn read(&self, path: &Path) -> Result<String>;
    /// Replaces the whole content of `path`.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISK
// ═══════════════════════════════════════════════════════════════════════════════

/// Mode of files `DiskFs` creates.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFs;

impl OutputFs for DiskFs {
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| TransformError::io(dir, e.into()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| TransformError::io(path, e))
    }

    /// Writes to a temp file next to `path` and renames it over the target,
    /// so readers never observe a half-written file.
    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| TransformError::io(dir, e))?;

        #[cfg_attr(not(unix), allow(unused_mut))]
        let mut builder = tempfile::Builder::new();
        #[cfg(unix)]
        builder.permissions(fs::Permissions::from_mode(NEW_FILE_MODE));
        let mut tmp = builder.tempfile_in(dir).map_err(|e| TransformError::io(dir, e))?;

        // The renamed file takes the temp file's mode; keep the target's.
        if let Ok(existing) = fs::metadata(path) {
            tmp.as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| TransformError::io(tmp.path(), e))?;
        }
        tmp.write_all(contents.as_bytes())
            .map_err(|e| TransformError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| TransformError::io(path, e.error))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Path-keyed file map. Every write is also recorded in order.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
    writes: Mutex<Vec<PathBuf>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Adds a file without recording a write.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), contents.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path.as_ref())
            .cloned()
    }

    /// Paths passed to `write`, in call order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OutputFs for MemoryFs {
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Ok(files
            .keys()
            .filter(|path| path.starts_with(dir) && path.as_path() != dir)
            .cloned()
            .collect())
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.get(path).ok_or_else(|| {
            TransformError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        self.insert(path, contents);
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fs_lists_below_dir_only() {
        let fs = MemoryFs::new()
            .with_file("/dist/components/b.js", "b")
            .with_file("/dist/components/a.js", "a")
            .with_file("/dist/components/nested/c.js", "c")
            .with_file("/dist/custom-suffix.json", "\"\"");

        let files = fs.list_files(Path::new("/dist/components")).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("/dist/components/a.js"),
                PathBuf::from("/dist/components/b.js"),
                PathBuf::from("/dist/components/nested/c.js"),
            ]
        );
        assert!(fs.writes().is_empty());
    }

    #[test]
    fn test_memory_fs_missing_file() {
        let fs = MemoryFs::new();
        assert!(!fs.exists(Path::new("/nope.js")));
        assert!(matches!(
            fs.read(Path::new("/nope.js")),
            Err(TransformError::Io { .. })
        ));
    }

    #[test]
    fn test_disk_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("components/nested/my-icon.js");
        let top = dir.path().join("components/my-button.js");

        DiskFs.write(&nested, "icon").unwrap();
        DiskFs.write(&top, "button").unwrap();
        DiskFs.write(&top, "button v2").unwrap();

        assert!(DiskFs.exists(&top));
        assert_eq!(DiskFs.read(&top).unwrap(), "button v2");
        assert_eq!(
            DiskFs.list_files(&dir.path().join("components")).unwrap(),
            vec![top, nested]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_fs_write_keeps_file_mode() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("my-button.js");
        let created = dir.path().join("custom-suffix.json");
        fs::write(&existing, "button").unwrap();
        fs::set_permissions(&existing, fs::Permissions::from_mode(0o755)).unwrap();

        DiskFs.write(&existing, "button v2").unwrap();
        DiskFs.write(&created, "\"\"").unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&existing), 0o755);
        assert_eq!(mode(&created), 0o644);
        assert_eq!(DiskFs.read(&existing).unwrap(), "button v2");
    }

    #[test]
    fn test_disk_fs_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DiskFs.list_files(&dir.path().join("missing")).is_err());
    }
}
