//! Suffix artifact
//!
//! A JSON file holding the suffix as a single string. Rewritten modules
//! import it, so changing the suffix after the build is a matter of
//! rewriting this one file.

use crate::error::{Result, TransformError};
use crate::fs::{DiskFs, OutputFs};
use std::path::{Path, PathBuf};

pub const DEFAULT_ARTIFACT_NAME: &str = "custom-suffix.json";

/// `"v"` -> `"-v"`, the form tag names are suffixed with.
pub fn normalize_suffix(value: &str) -> String {
    format!("-{}", value)
}

pub fn write_suffix_artifact(fs: &dyn OutputFs, path: &Path, suffix: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(suffix).map_err(|source| TransformError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs.write(path, &json)
}

pub fn read_suffix_artifact(fs: &dyn OutputFs, path: &Path) -> Result<String> {
    let json = fs.read(path)?;
    serde_json::from_str(&json).map_err(|source| TransformError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Post-build configuration step: stores `-<value>` in
/// `<dist_dir>/<artifact_name>`. The dist directory must already exist.
pub fn set_custom_suffix(dist_dir: &Path, artifact_name: &str, value: &str) -> Result<PathBuf> {
    if !dist_dir.is_dir() {
        return Err(TransformError::io(
            dist_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "dist folder not found"),
        ));
    }

    let path = dist_dir.join(artifact_name);
    let suffix = normalize_suffix(value);
    write_suffix_artifact(&DiskFs, &path, &suffix)?;
    tracing::info!(path = %path.display(), suffix = %suffix, "custom suffix updated");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    #[test]
    fn test_normalize_suffix() {
        assert_eq!(normalize_suffix("v2"), "-v2");
    }

    #[test]
    fn test_artifact_round_trip_in_memory() {
        let fs = MemoryFs::new();
        let path = Path::new("/dist/custom-suffix.json");
        write_suffix_artifact(&fs, path, "").unwrap();
        assert_eq!(fs.get(path).unwrap(), "\"\"");

        write_suffix_artifact(&fs, path, "-a\"b").unwrap();
        assert_eq!(read_suffix_artifact(&fs, path).unwrap(), "-a\"b");
    }

    #[test]
    fn test_invalid_artifact_is_json_error() {
        let fs = MemoryFs::new().with_file("/dist/custom-suffix.json", "-v2");
        let err = read_suffix_artifact(&fs, Path::new("/dist/custom-suffix.json")).unwrap_err();
        assert!(matches!(err, TransformError::Json { .. }));
    }

    #[test]
    fn test_set_custom_suffix_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = set_custom_suffix(dir.path(), DEFAULT_ARTIFACT_NAME, "v2").unwrap();
        assert_eq!(path, dir.path().join("custom-suffix.json"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\"-v2\"");

        let missing = dir.path().join("missing");
        assert!(set_custom_suffix(&missing, DEFAULT_ARTIFACT_NAME, "v2").is_err());
    }
}
