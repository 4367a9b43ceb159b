//! Project stores
//!
//! A project store hands out the finished mix of a project as an
//! `AudioBuffer`. Calls are blocking; the scheduler runs them on the
//! blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use walkdir::WalkDir;

use crate::engine::{import_audio, AudioBuffer};
use crate::error::{ExportError, Result};

/// Source of project mixes
pub trait ProjectStore: Send + Sync {
    /// Load the mix for a project
    ///
    /// Any failure is reported as `ProjectLoadError`.
    fn load_audio(&self, project_id: &str) -> Result<AudioBuffer>;

    /// Ids of the projects this store can load
    fn list_projects(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

fn load_error(project_id: &str, reason: impl Into<String>) -> ExportError {
    ExportError::ProjectLoadError {
        project_id: project_id.to_string(),
        reason: reason.into(),
    }
}

/// Project mixes stored as `<dir>/<project_id>.wav`
#[derive(Debug, Clone)]
pub struct WavProjectStore {
    dir: PathBuf,
}

impl WavProjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a project's mix, rejecting ids that would leave the directory
    pub fn project_path(&self, project_id: &str) -> Result<PathBuf> {
        let valid = !project_id.is_empty()
            && project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !project_id.starts_with('.');
        if !valid {
            return Err(load_error(project_id, "invalid project id"));
        }
        Ok(self.dir.join(format!("{}.wav", project_id)))
    }
}

impl ProjectStore for WavProjectStore {
    fn load_audio(&self, project_id: &str) -> Result<AudioBuffer> {
        let path = self.project_path(project_id)?;
        if !path.is_file() {
            return Err(load_error(
                project_id,
                format!("no mix at {}", path.display()),
            ));
        }
        import_audio(&path).map_err(|e| load_error(project_id, e.to_string()))
    }

    fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects: Vec<String> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"))
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        projects.sort();
        Ok(projects)
    }
}

/// In-memory project mixes
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, AudioBuffer>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: impl Into<String>, audio: AudioBuffer) {
        if let Ok(mut projects) = self.projects.write() {
            projects.insert(project_id.into(), audio);
        }
    }

    pub fn with_project(self, project_id: impl Into<String>, audio: AudioBuffer) -> Self {
        self.insert(project_id, audio);
        self
    }
}

impl ProjectStore for MemoryProjectStore {
    fn load_audio(&self, project_id: &str) -> Result<AudioBuffer> {
        let projects = self
            .projects
            .read()
            .map_err(|_| load_error(project_id, "project store lock poisoned"))?;
        projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| load_error(project_id, "project not found"))
    }

    fn list_projects(&self) -> Result<Vec<String>> {
        let projects = self.projects.read().map_err(|_| ExportError::Config {
            reason: "project store lock poisoned".to_string(),
        })?;
        let mut ids: Vec<String> = projects.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{export_audio, generate_stereo_test_tone};

    #[test]
    fn test_wav_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let tone = generate_stereo_test_tone(440.0, 440.0, 0.3, 0.1, 44100);
        export_audio(&tone, &dir.path().join("song-1.wav"), 24).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

        let store = WavProjectStore::new(dir.path());
        assert_eq!(store.list_projects().unwrap(), vec!["song-1".to_string()]);

        let loaded = store.load_audio("song-1").unwrap();
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.num_channels(), 2);
    }

    #[test]
    fn test_missing_project_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = WavProjectStore::new(dir.path());
        let err = store.load_audio("absent").unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_LOAD_ERROR");
    }

    #[test]
    fn test_path_traversal_rejected() {
        let store = WavProjectStore::new("/tmp/projects");
        assert!(store.project_path("../etc/passwd").is_err());
        assert!(store.project_path("a/b").is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryProjectStore::new()
            .with_project("b", generate_stereo_test_tone(440.0, 440.0, 0.1, 0.1, 48000))
            .with_project("a", generate_stereo_test_tone(440.0, 440.0, 0.1, 0.1, 48000));
        assert_eq!(store.list_projects().unwrap(), vec!["a", "b"]);
        assert!(store.load_audio("c").is_err());
    }
}
