// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Save sinks — where rendered documents go on save and autosave.

use std::path::{Path, PathBuf};

use image::RgbImage;
use redactwerk_core::error::{RedactwerkError, Result};
use tracing::{info, instrument};

/// Consumer of final renders.
pub trait SaveSink {
    fn save(&self, image: &RgbImage) -> Result<()>;
}

/// Writes renders to a file; the format is inferred from the extension.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sink writing `<stem>_autosave.<ext>` next to `source`.
    pub fn autosave_for(source: impl AsRef<Path>) -> Self {
        Self::new(autosave_path(source.as_ref()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveSink for FileSink {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save(&self, image: &RgbImage) -> Result<()> {
        image.save(&self.path).map_err(|err| {
            RedactwerkError::Encode(format!(
                "failed to save image to {}: {}",
                self.path.display(),
                err
            ))
        })?;
        info!(width = image.width(), height = image.height(), "Render saved");
        Ok(())
    }
}

/// `dir/name.png` becomes `dir/name_autosave.png`; a missing extension
/// falls back to PNG.
pub fn autosave_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_owned());
    source.with_file_name(format!("{stem}_autosave.{ext}"))
}
