//! User-supplied metadata and render settings

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dsp::LimiterStyle;
use crate::error::{ExportError, Result};

/// Track metadata supplied with an export request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit: Option<bool>,
    /// Any other platform-specific field
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ExportMetadata {
    /// Value of a named field, if set and non-blank
    pub fn field(&self, name: &str) -> Option<String> {
        let value = match name {
            "title" => self.title.clone(),
            "artist" => self.artist.clone(),
            "album" => self.album.clone(),
            "isrc" => self.isrc.clone(),
            "genre" => self.genre.clone(),
            "release_date" => self.release_date.clone(),
            "explicit" => self.explicit.map(|e| e.to_string()),
            other => self.extra.get(other).cloned(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Required fields that are missing or blank
    pub fn missing_fields<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| self.field(name).is_none())
            .map(|name| name.as_str())
            .collect()
    }
}

/// Per-job render options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    /// Peak-normalize before the final safety limiter
    pub normalize: bool,
    pub limiter_style: LimiterStyle,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            normalize: false,
            limiter_style: LimiterStyle::default(),
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("fade_in", self.fade_in_secs), ("fade_out", self.fade_out_secs)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ExportError::InvalidRequest {
                    reason: format!("{} must be a non-negative number of seconds", name),
                });
            }
        }
        Ok(())
    }
}
