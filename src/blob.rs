//! On-disk artifact storage for plugin packages.
//!
//! Each uploaded version is stored as
//! `base_dir/{plugin_id}/{version}/{name}_{version}.zip`. Content hash
//! (blake3) and size are computed over the raw bytes at store time and kept
//! on the version record so clients can verify downloads.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HubError, Result};

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub file_name: String,
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)?;
            tracing::debug!("Created artifact directory: {}", base_dir.display());
        }
        Ok(Self { base_dir })
    }

    pub fn store(
        &self,
        plugin_id: u64,
        plugin_name: &str,
        version: &str,
        bytes: &[u8],
    ) -> Result<StoredArtifact> {
        validate_path_segment(version)?;
        if bytes.is_empty() {
            return Err(HubError::invalid_input("Artifact cannot be empty"));
        }

        let dir = self.version_dir(plugin_id, version);
        fs::create_dir_all(&dir)?;

        let file_name = artifact_file_name(plugin_name, version);
        let path = dir.join(&file_name);
        fs::write(&path, bytes)?;

        let hash = blake3::hash(bytes).to_hex().to_string();
        let size = bytes.len() as u64;
        tracing::debug!(
            "Stored artifact {} ({} bytes) for plugin {}",
            file_name,
            size,
            plugin_id
        );

        Ok(StoredArtifact {
            file_name,
            hash,
            size,
        })
    }

    /// Reads an artifact back by the file name recorded at store time.
    pub fn read(&self, plugin_id: u64, version: &str, file_name: &str) -> Result<Vec<u8>> {
        validate_path_segment(version)?;
        validate_path_segment(file_name)?;
        let path = self.version_dir(plugin_id, version).join(file_name);
        if !path.exists() {
            return Err(HubError::version_not_found(version));
        }
        Ok(fs::read(path)?)
    }

    /// Removes a single version's artifact. Missing files are not an error;
    /// the version row is the source of truth.
    pub fn remove_version(&self, plugin_id: u64, version: &str) -> Result<()> {
        validate_path_segment(version)?;
        let dir = self.version_dir(plugin_id, version);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Removes all artifacts for a plugin (cascade on plugin delete).
    pub fn remove_plugin(&self, plugin_id: u64) -> Result<()> {
        let dir = self.base_dir.join(plugin_id.to_string());
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn version_dir(&self, plugin_id: u64, version: &str) -> PathBuf {
        self.base_dir.join(plugin_id.to_string()).join(version)
    }
}

fn artifact_file_name(plugin_name: &str, version: &str) -> String {
    // Plugin names may contain spaces; keep the artifact name shell-friendly
    let safe_name: String = plugin_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}.zip", safe_name, version)
}

fn validate_path_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(HubError::invalid_input("Version cannot be empty"));
    }
    if segment == "." || segment == ".." {
        return Err(HubError::invalid_input("Version cannot be '.' or '..'"));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(HubError::invalid_input(
            "Version cannot contain path separators",
        ));
    }
    if segment.chars().any(char::is_control) {
        return Err(HubError::invalid_input(
            "Version cannot contain control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn store_and_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path()).unwrap();

        let bytes = b"PK\x03\x04 not really a zip";
        let stored = store.store(1, "scroll-tracker", "1.0.0", bytes).unwrap();
        assert_eq!(stored.size, bytes.len() as u64);
        assert_eq!(stored.hash, blake3::hash(bytes).to_hex().to_string());
        assert_eq!(stored.file_name, "scroll-tracker_1.0.0.zip");

        let read_back = store.read(1, "1.0.0", &stored.file_name).unwrap();
        assert_eq!(read_back, bytes);
    }

    #[test]
    fn read_missing_version_fails() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path()).unwrap();
        assert!(matches!(
            store.read(1, "9.9.9", "scroll-tracker_9.9.9.zip"),
            Err(HubError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn rejects_path_traversal_segments() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path()).unwrap();
        assert!(store.store(1, "x", "../evil", b"data").is_err());
        assert!(store.store(1, "x", "..", b"data").is_err());
        assert!(store.read(1, "a/b", "f.zip").is_err());
        assert!(store.read(1, "1.0.0", "../escape.zip").is_err());
        assert!(store.read(1, "1.0.0", "a/b.zip").is_err());
    }

    #[test]
    fn empty_artifact_rejected() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path()).unwrap();
        assert!(store.store(1, "x", "1.0.0", b"").is_err());
    }

    #[test]
    fn remove_version_and_plugin() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path()).unwrap();
        store.store(2, "p", "1.0.0", b"a").unwrap();
        store.store(2, "p", "1.1.0", b"b").unwrap();

        store.remove_version(2, "1.0.0").unwrap();
        assert!(store.read(2, "1.0.0", "p_1.0.0.zip").is_err());
        assert!(store.read(2, "1.1.0", "p_1.1.0.zip").is_ok());

        store.remove_plugin(2).unwrap();
        assert!(store.read(2, "1.1.0", "p_1.1.0.zip").is_err());
    }
}
