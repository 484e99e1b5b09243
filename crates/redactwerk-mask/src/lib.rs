// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// redactwerk-mask — Redaction mask compositing and compressed edit history.
//
// Provides the compositor (original pixels + committed and transient masks,
// blurred preview and final renders), patch extraction (connected-region
// bounding boxes, DEFLATE-compressed), and a bounded undo/redo history that
// rebuilds any stored mask state from its patches.

pub mod compositor;
pub mod extract;
pub mod history;
pub mod patch;
pub mod thumbnail;

/// Single-channel redaction bitmap, one byte per pixel, values {0, 255}.
pub type Mask = image::GrayImage;

/// Three-channel 8-bit RGB pixel data.
pub type PixelBuffer = image::RgbImage;

// Re-export the primary structs so callers can use `redactwerk_mask::Compositor` etc.
pub use compositor::Compositor;
pub use extract::PatchExtractor;
pub use history::{HistoryEntry, HistoryStore};
pub use patch::{CompressedPatch, PatchRect};
pub use thumbnail::Thumbnail;
