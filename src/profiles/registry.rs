//! Export profile registry
//!
//! Read-only catalog of platform profiles keyed by id. The built-in
//! catalog ships as JSON data; additional profiles are loaded from JSON
//! files. Adding a platform never requires a code change.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::types::ExportProfile;
use crate::error::{ExportError, Result};

const BUILTIN_PROFILES: &str = include_str!("builtin.json");

/// Catalog of export profiles
///
/// Profiles are stored behind `Arc` so workers can hold on to one while
/// the registry is shared.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Arc<ExportProfile>>,
}

impl ProfileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in platform catalog
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.load_json(BUILTIN_PROFILES)?;
        Ok(registry)
    }

    /// Register every profile in a JSON array
    ///
    /// Returns the number of profiles loaded. Nothing is registered if any
    /// entry fails validation.
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        let profiles: Vec<ExportProfile> = serde_json::from_str(json)?;
        for profile in &profiles {
            profile.validate()?;
        }
        let count = profiles.len();
        for profile in profiles {
            self.insert(profile);
        }
        Ok(count)
    }

    /// Register every profile in a JSON file
    pub fn from_json_file(&mut self, path: &Path) -> Result<usize> {
        let json = std::fs::read_to_string(path)?;
        let count = self.load_json(&json)?;
        tracing::info!(path = %path.display(), count, "Loaded export profiles");
        Ok(count)
    }

    /// Add one profile, replacing any profile with the same id
    pub fn register(&mut self, profile: ExportProfile) -> Result<()> {
        profile.validate()?;
        self.insert(profile);
        Ok(())
    }

    fn insert(&mut self, profile: ExportProfile) {
        if self.profiles.contains_key(&profile.id) {
            tracing::debug!(profile_id = %profile.id, "Replacing export profile");
        }
        self.profiles.insert(profile.id.clone(), Arc::new(profile));
    }

    /// Look up a profile by id
    pub fn get(&self, id: &str) -> Result<Arc<ExportProfile>> {
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| ExportError::UnknownProfile {
                profile_id: id.to_string(),
            })
    }

    /// All profiles ordered by id
    pub fn list(&self) -> Vec<ExportProfile> {
        self.profiles.values().map(|p| p.as_ref().clone()).collect()
    }

    /// Check if a profile is registered
    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
