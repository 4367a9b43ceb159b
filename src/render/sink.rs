//! Artifact sinks
//!
//! Where encoded bytes land. The renderer only knows a relative key such as
//! `<job_id>/<profile_id>.wav`; the sink decides what that means.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ExportError, Result};

/// Destination for rendered artifacts
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `key` and return the artifact's location
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String>;
}

/// Writes artifacts below a root directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSink for DirectorySink {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(ExportError::InvalidRequest {
                reason: format!("artifact key {:?} is not a relative path", key),
            });
        }

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
        Ok(path.display().to_string())
    }
}

/// Keeps artifacts in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.artifacts
            .lock()
            .ok()
            .and_then(|artifacts| artifacts.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .map(|artifacts| artifacts.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let mut artifacts = self.artifacts.lock().map_err(|_| {
            ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory sink lock poisoned",
            ))
        })?;
        artifacts.insert(key.to_string(), bytes.to_vec());
        Ok(format!("memory://{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_sink_creates_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        let location = sink.write("job-1/spotify_hq.wav", b"RIFF").unwrap();
        assert!(location.ends_with("spotify_hq.wav"));
        assert_eq!(
            std::fs::read(dir.path().join("job-1/spotify_hq.wav")).unwrap(),
            b"RIFF"
        );
    }

    #[test]
    fn test_directory_sink_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        assert!(sink.write("../outside.wav", b"x").is_err());
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert_eq!(sink.write("a/b.flac", b"fLaC").unwrap(), "memory://a/b.flac");
        assert_eq!(sink.get("a/b.flac").unwrap(), b"fLaC");
        assert_eq!(sink.keys(), vec!["a/b.flac".to_string()]);
    }
}
