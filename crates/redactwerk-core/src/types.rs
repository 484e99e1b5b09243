// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Redactwerk compositor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a loaded document, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which mask a paint operation writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskTarget {
    /// The authoritative mask that history records.
    Committed,
    /// The in-progress stroke overlay, merged on commit.
    Temporary,
}

/// Width and height of a document mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskShape {
    pub width: u32,
    pub height: u32,
}

impl MaskShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of mask bytes (one per pixel).
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the rectangle `(x, y, width, height)` lies fully inside.
    pub fn contains(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        x as u64 + width as u64 <= self.width as u64
            && y as u64 + height as u64 <= self.height as u64
    }
}

/// An axis-aligned rectangle in image space, as produced by a sensitive-text
/// detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow the region by `margin` pixels on every side.
    ///
    /// The top-left corner is not moved past zero, matching how detected
    /// words near the page edge are padded.
    pub fn padded(&self, margin: u32) -> Self {
        let m = i32::try_from(margin).unwrap_or(i32::MAX);
        Self {
            x: self.x.saturating_sub(m).max(0),
            y: self.y.saturating_sub(m).max(0),
            width: self.width.saturating_add(margin.saturating_mul(2)),
            height: self.height.saturating_add(margin.saturating_mul(2)),
        }
    }
}

/// A single paint gesture from the input collaborator, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrokeEvent {
    /// Freehand brush dab: a filled circle.
    Brush { x: i32, y: i32, radius: i32 },
    /// Brush drag between two pointer samples.
    Line {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        thickness: i32,
    },
    /// Filled rectangle with inclusive corners.
    Rectangle { x1: i32, y1: i32, x2: i32, y2: i32 },
    /// Filled ellipse inscribed in the corner box.
    Ellipse { x1: i32, y1: i32, x2: i32, y2: i32 },
}

/// Blur parameters for compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlurSettings {
    /// Kernel half-size; the kernel spans `2 * intensity + 1` pixels.
    pub intensity: u32,
    /// Number of repeated blur passes.
    pub iterations: u32,
}

impl BlurSettings {
    pub fn new(intensity: u32, iterations: u32) -> Self {
        Self {
            intensity,
            iterations,
        }
    }
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            intensity: 15,
            iterations: 5,
        }
    }
}
