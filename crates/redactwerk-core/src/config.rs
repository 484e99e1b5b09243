// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::BlurSettings;

/// File name used when the configuration lives in a data directory.
pub const CONFIG_FILE: &str = "redactwerk_config.json";

/// Persistent editor settings.
///
/// Missing keys in a stored file fall back to their defaults, so older files
/// keep loading as fields are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Brush diameter in image pixels.
    pub brush_size: u32,
    /// Blur kernel half-size.
    pub blur_intensity: u32,
    /// Number of blur passes.
    pub blur_iterations: u32,
    /// Whether the autosave timer runs while a document is open.
    pub auto_save_enabled: bool,
    /// Minutes between autosaves (never below 1).
    pub auto_save_interval_minutes: u64,
    /// Include the in-progress stroke when rendering previews.
    pub show_preview: bool,
    /// Number of history entries kept before the oldest is evicted.
    pub max_history: usize,
    /// History strip thumbnail bounds.
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            brush_size: 20,
            blur_intensity: 15,
            blur_iterations: 5,
            auto_save_enabled: false,
            auto_save_interval_minutes: 5,
            show_preview: true,
            max_history: 20,
            thumbnail_width: 100,
            thumbnail_height: 75,
        }
    }
}

impl EditorConfig {
    /// Load settings from `path`, or defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        info!(path = %path.display(), "editor config loaded");
        Ok(config)
    }

    /// Write settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!(path = %path.as_ref().display(), "editor config saved");
        Ok(())
    }

    /// Blur settings used for renders and saves.
    pub fn blur(&self) -> BlurSettings {
        BlurSettings::new(self.blur_intensity, self.blur_iterations)
    }

    /// Brush radius derived from the configured diameter.
    pub fn brush_radius(&self) -> i32 {
        (self.brush_size / 2) as i32
    }

    /// Autosave interval in minutes, clamped to at least one.
    pub fn auto_save_interval(&self) -> u64 {
        self.auto_save_interval_minutes.max(1)
    }
}
