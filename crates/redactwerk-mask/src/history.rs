// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded, linear undo/redo history of mask states.
//
// Each entry stores the committed mask as compressed bounding-box patches
// rather than a full frame. Any entry can be rebuilt on demand; the store never
// touches the live mask, it only hands out fresh reconstructions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use redactwerk_core::error::{RedactwerkError, Result};
use redactwerk_core::types::MaskShape;
use tracing::{debug, info, instrument, warn};

use crate::Mask;
use crate::patch::CompressedPatch;
use crate::thumbnail::Thumbnail;

/// Default number of entries kept before the oldest is evicted.
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// One committed mask state.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    patches: Vec<CompressedPatch>,
    timestamp: DateTime<Utc>,
    thumbnail: Option<Thumbnail>,
}

impl HistoryEntry {
    pub fn new(patches: Vec<CompressedPatch>, thumbnail: Option<Thumbnail>) -> Self {
        Self {
            patches,
            timestamp: Utc::now(),
            thumbnail,
        }
    }

    /// Patches in blit order.
    pub fn patches(&self) -> &[CompressedPatch] {
        &self.patches
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    /// Total compressed bytes held by this entry's patches.
    pub fn compressed_len(&self) -> usize {
        self.patches.iter().map(CompressedPatch::compressed_len).sum()
    }

    /// Rebuild the mask this entry describes onto a zero mask of `shape`.
    pub fn reconstruct(&self, shape: MaskShape) -> Result<Mask> {
        let mut mask = Mask::new(shape.width, shape.height);
        for patch in &self.patches {
            if !shape.contains(patch.x(), patch.y(), patch.width(), patch.height()) {
                return Err(RedactwerkError::InvalidRegion(format!(
                    "patch {:?} outside {}x{} mask",
                    patch.rect(),
                    shape.width,
                    shape.height
                )));
            }
            let data = patch.decompress()?;
            image::imageops::replace(&mut mask, &data, patch.x() as i64, patch.y() as i64);
        }
        Ok(mask)
    }
}

/// The undo/redo log.
///
/// Either empty (no cursor) or populated with the cursor on the current
/// entry. Pushing after an undo discards the redo branch; pushing past
/// capacity evicts the oldest entry together with its thumbnail.
#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    max_history: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryStore {
    /// Create an empty store keeping at most `max_history` entries (at least one).
    pub fn new(max_history: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            max_history: max_history.max(1),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the current entry, `None` when empty.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    /// One slot per entry, in order, for the history strip.
    pub fn thumbnails(&self) -> Vec<Option<&Thumbnail>> {
        self.entries.iter().map(HistoryEntry::thumbnail).collect()
    }

    pub fn thumbnail(&self, index: usize) -> Option<&Thumbnail> {
        self.entries.get(index).and_then(HistoryEntry::thumbnail)
    }

    pub fn current_thumbnail(&self) -> Option<&Thumbnail> {
        self.cursor.and_then(|c| self.thumbnail(c))
    }

    /// Compressed bytes held across all entries.
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(HistoryEntry::compressed_len).sum()
    }

    // -- Transitions ----------------------------------------------------------

    /// Record a new state after the cursor and make it current.
    #[instrument(skip_all, fields(patches = patches.len()))]
    pub fn push(&mut self, patches: Vec<CompressedPatch>, thumbnail: Option<Thumbnail>) {
        if let Some(cursor) = self.cursor {
            let discarded = self.entries.len() - (cursor + 1);
            if discarded > 0 {
                debug!(discarded, "Dropping redo branch");
                self.entries.truncate(cursor + 1);
            }
        }

        self.entries.push_back(HistoryEntry::new(patches, thumbnail));

        while self.entries.len() > self.max_history {
            self.entries.pop_front();
            debug!(max_history = self.max_history, "Evicted oldest history entry");
        }

        self.cursor = Some(self.entries.len() - 1);
        debug!(
            len = self.entries.len(),
            memory = self.memory_usage(),
            "History entry pushed"
        );
    }

    /// Step back one entry and return its mask, or `None` at the start.
    pub fn undo(&mut self, shape: MaskShape) -> Result<Option<Mask>> {
        match self.cursor {
            Some(c) if c > 0 => self.move_to(c - 1, shape).map(Some),
            _ => Ok(None),
        }
    }

    /// Step forward one entry and return its mask, or `None` at the tail.
    pub fn redo(&mut self, shape: MaskShape) -> Result<Option<Mask>> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => self.move_to(c + 1, shape).map(Some),
            _ => Ok(None),
        }
    }

    /// Jump straight to `index` and return its mask.
    ///
    /// `None` when `index` is out of range or already current.
    pub fn seek(&mut self, index: usize, shape: MaskShape) -> Result<Option<Mask>> {
        if index >= self.entries.len() || self.cursor == Some(index) {
            return Ok(None);
        }
        self.move_to(index, shape).map(Some)
    }

    /// Rebuild entry `index` without moving the cursor.
    pub fn reconstruct(&self, index: usize, shape: MaskShape) -> Result<Option<Mask>> {
        match self.entries.get(index) {
            Some(entry) => entry.reconstruct(shape).map(Some),
            None => Ok(None),
        }
    }

    /// Drop every entry and return to the empty state.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = None;
        info!("History reset");
    }

    /// Reconstruct first, then move, so a corrupt entry leaves the cursor
    /// where it was.
    fn move_to(&mut self, index: usize, shape: MaskShape) -> Result<Mask> {
        let mask = self.entries[index].reconstruct(shape).inspect_err(|err| {
            warn!(index, error = %err, "History reconstruction failed");
        })?;
        debug!(from = ?self.cursor, to = index, "History cursor moved");
        self.cursor = Some(index);
        Ok(mask)
    }
}
