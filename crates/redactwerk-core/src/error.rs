// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Redactwerk.

use thiserror::Error;

/// Reasons a pixel buffer cannot become the current document.
///
/// A failed load never touches the previously loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("image buffer is empty")]
    Empty,

    #[error("unsupported channel count: {0} (expected 1, 3, or 4)")]
    UnsupportedChannels(u8),

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// Top-level error type for all Redactwerk operations.
#[derive(Debug, Error)]
pub enum RedactwerkError {
    // -- Document errors --
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("no document loaded")]
    NoDocument,

    #[error("mask dimensions {actual_width}x{actual_height} do not match document {expected_width}x{expected_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    // -- History errors --
    #[error("corrupt history patch: {0}")]
    CorruptPatch(String),

    #[error("invalid patch region: {0}")]
    InvalidRegion(String),

    // -- Output / persistence --
    #[error("autosave error: {0}")]
    Autosave(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RedactwerkError {
    /// Whether this error means stored history can no longer be trusted.
    ///
    /// The document session answers these by dropping back to a clean state.
    pub fn is_fatal_history_error(&self) -> bool {
        matches!(self, Self::CorruptPatch(_) | Self::InvalidRegion(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RedactwerkError>;
