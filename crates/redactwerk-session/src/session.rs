// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document session — the single owner of a document's compositor and history.
//
// UI stroke events land here, strokes are committed into the mask and
// recorded as history entries, and undo/redo/seek rebuild masks from history
// and hand them back to the compositor. Results produced on worker threads
// (decoded images, detected regions) must be passed in on the thread that owns
// the session.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use redactwerk_core::error::{LoadError, RedactwerkError, Result};
use redactwerk_core::types::{DocumentId, MaskShape, MaskTarget, Region, StrokeEvent};
use redactwerk_core::EditorConfig;
use redactwerk_mask::{Compositor, HistoryStore, Mask, PatchExtractor};
use tracing::{debug, error, info, instrument, warn};

use crate::autosave::SaveGuard;
use crate::sink::{FileSink, SaveSink};

/// One open document: pixels, masks, and the edit history for them.
pub struct DocumentSession {
    id: DocumentId,
    config: EditorConfig,
    compositor: Compositor,
    history: HistoryStore,
    source: Option<PathBuf>,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl DocumentSession {
    pub fn new(config: EditorConfig) -> Self {
        let history = HistoryStore::new(config.max_history);
        Self {
            id: DocumentId::new(),
            config,
            compositor: Compositor::new(),
            history,
            source: None,
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Replace the settings. A new history capacity applies from the next load.
    pub fn set_config(&mut self, config: EditorConfig) {
        self.config = config;
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn is_loaded(&self) -> bool {
        self.compositor.is_loaded()
    }

    pub fn current_mask(&self) -> Option<&Mask> {
        self.compositor.current_mask()
    }

    /// Path the document was opened from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    // -- Loading --------------------------------------------------------------

    /// Start a new document from decoded pixels.
    ///
    /// History is reset and a baseline entry for the clean mask is recorded,
    /// so the first edit can be undone.
    #[instrument(skip_all)]
    pub fn load(&mut self, image: DynamicImage) -> Result<()> {
        self.compositor.load(image)?;
        self.begin_document(None)
    }

    /// Start a new document from raw interleaved pixel data.
    pub fn load_raw(&mut self, width: u32, height: u32, channels: u8, bytes: Vec<u8>) -> Result<()> {
        self.compositor.load_raw(width, height, channels, bytes)?;
        self.begin_document(None)
    }

    /// Decode an image file and start a new document from it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|err| {
            LoadError::Decode(format!("failed to open {}: {}", path.display(), err))
        })?;
        self.compositor.load(image)?;
        self.begin_document(Some(path.to_path_buf()))
    }

    fn begin_document(&mut self, source: Option<PathBuf>) -> Result<()> {
        self.id = DocumentId::new();
        self.source = source;
        self.history = HistoryStore::new(self.config.max_history);
        self.record_state()?;
        self.compositor.mark_clean();
        info!(document = %self.id, "Document session started");
        Ok(())
    }

    // -- Editing --------------------------------------------------------------

    /// Paint an in-progress stroke event into the transient mask.
    pub fn apply(&mut self, event: &StrokeEvent) {
        self.apply_to(event, MaskTarget::Temporary);
    }

    /// Paint a stroke event into the given mask.
    pub fn apply_to(&mut self, event: &StrokeEvent, target: MaskTarget) {
        match *event {
            StrokeEvent::Brush { x, y, radius } => self.compositor.add_stroke(x, y, radius, target),
            StrokeEvent::Line {
                x1,
                y1,
                x2,
                y2,
                thickness,
            } => self.compositor.add_line(x1, y1, x2, y2, thickness, target),
            StrokeEvent::Rectangle { x1, y1, x2, y2 } => {
                self.compositor.add_rectangle(x1, y1, x2, y2, target)
            }
            StrokeEvent::Ellipse { x1, y1, x2, y2 } => {
                self.compositor.add_ellipse(x1, y1, x2, y2, target)
            }
        }
    }

    /// Brush dab at `(x, y)` with the configured brush size.
    pub fn brush(&mut self, x: i32, y: i32) {
        let radius = self.config.brush_radius();
        self.apply(&StrokeEvent::Brush { x, y, radius });
    }

    /// Commit the in-progress stroke and record it in history.
    #[instrument(skip(self), fields(document = %self.id))]
    pub fn end_stroke(&mut self) -> Result<()> {
        if !self.is_loaded() {
            return Ok(());
        }
        self.compositor.commit();
        self.record_state()
    }

    /// Drop the in-progress stroke without committing.
    pub fn cancel_stroke(&mut self) {
        self.compositor.clear_transient();
    }

    /// Paint regions found by the sensitive-text detector and record them as
    /// one history entry.
    #[instrument(skip(self, regions), fields(document = %self.id, count = regions.len()))]
    pub fn apply_detected_regions(&mut self, regions: &[Region]) -> Result<()> {
        if !self.is_loaded() || regions.is_empty() {
            debug!("No detected regions to apply");
            return Ok(());
        }
        self.compositor.add_regions(regions, MaskTarget::Committed);
        self.record_state()
    }

    /// Clear every redaction and start history over from the clean state.
    #[instrument(skip(self), fields(document = %self.id))]
    pub fn reset_all(&mut self) -> Result<()> {
        if !self.is_loaded() {
            return Ok(());
        }
        self.compositor.reset();
        self.history.reset();
        self.record_state()
    }

    // -- History --------------------------------------------------------------

    /// Step back one history entry. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        self.restore(|history, shape| history.undo(shape))
    }

    /// Step forward one history entry. `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        self.restore(|history, shape| history.redo(shape))
    }

    /// Jump to history entry `index`, as clicked in the thumbnail strip.
    pub fn seek(&mut self, index: usize) -> Result<bool> {
        self.restore(|history, shape| history.seek(index, shape))
    }

    fn restore(
        &mut self,
        step: impl FnOnce(&mut HistoryStore, MaskShape) -> Result<Option<Mask>>,
    ) -> Result<bool> {
        let Some(shape) = self.compositor.dimensions() else {
            return Ok(false);
        };
        match step(&mut self.history, shape) {
            Ok(Some(mask)) => {
                self.compositor.set_mask(mask)?;
                debug!(cursor = ?self.history.cursor(), "Mask restored from history");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) if err.is_fatal_history_error() => {
                error!(document = %self.id, error = %err, "History corrupt, resetting document");
                self.reset_all()?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Capture the committed mask as a new history entry with a thumbnail.
    fn record_state(&mut self) -> Result<()> {
        let Some(mask) = self.compositor.current_mask() else {
            return Ok(());
        };
        let patches = PatchExtractor::extract(mask)?;
        let thumbnail = self
            .compositor
            .thumbnail(self.config.thumbnail_width, self.config.thumbnail_height);
        self.history.push(patches, thumbnail);
        Ok(())
    }

    // -- Output ---------------------------------------------------------------

    /// Live preview with the configured blur; includes the in-progress stroke
    /// when previews are enabled.
    pub fn render_preview(&self) -> Option<RgbImage> {
        let blur = self.config.blur();
        self.compositor
            .render(blur.intensity, blur.iterations, self.config.show_preview)
    }

    /// Final render of the committed mask with the configured blur.
    pub fn render_final(&self) -> Option<RgbImage> {
        self.compositor.render_final(self.config.blur())
    }

    /// Render and hand the result to `sink`; the document is clean afterwards.
    #[instrument(skip_all, fields(document = %self.id))]
    pub fn save(&mut self, sink: &dyn SaveSink) -> Result<()> {
        let render = self.render_final().ok_or(RedactwerkError::NoDocument)?;
        sink.save(&render)?;
        self.compositor.mark_clean();
        info!("Document saved");
        Ok(())
    }

    /// Respond to an autosave signal.
    ///
    /// Returns `Ok(false)` without rendering when no document is loaded or
    /// another save still holds `guard`. Autosaves do not clear the dirty flag.
    #[instrument(skip_all, fields(document = %self.id))]
    pub fn autosave(&self, sink: &dyn SaveSink, guard: &SaveGuard) -> Result<bool> {
        if !self.is_loaded() {
            debug!("Autosave skipped, no document");
            return Ok(false);
        }
        let Some(_token) = guard.try_begin() else {
            warn!("Autosave skipped, previous save still running");
            return Ok(false);
        };
        let render = self.render_final().ok_or(RedactwerkError::NoDocument)?;
        sink.save(&render)?;
        info!("Autosave complete");
        Ok(true)
    }

    /// File sink writing `<stem>_autosave.<ext>` next to the opened file.
    pub fn autosave_sink(&self) -> Option<FileSink> {
        self.source.as_deref().map(FileSink::autosave_for)
    }

    /// Whether the committed mask changed since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.compositor.is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use redactwerk_mask::CompressedPatch;
    use std::cell::RefCell;

    /// 1-pixel checkerboard: any blur visibly changes it.
    fn checkerboard(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        }))
    }

    fn session_with(width: u32, height: u32) -> DocumentSession {
        let mut s = DocumentSession::default();
        s.load(checkerboard(width, height)).unwrap();
        s
    }

    fn is_clear(mask: &Mask) -> bool {
        mask.pixels().all(|p| p.0[0] == 0)
    }

    /// Sink that keeps every render in memory.
    #[derive(Default)]
    struct MemorySink {
        saved: RefCell<Vec<RgbImage>>,
    }

    impl SaveSink for MemorySink {
        fn save(&self, image: &RgbImage) -> Result<()> {
            self.saved.borrow_mut().push(image.clone());
            Ok(())
        }
    }

    #[test]
    fn load_records_clean_baseline() {
        let s = session_with(40, 30);
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.history().cursor(), Some(0));
        assert!(s.history().current_thumbnail().is_some());
        assert!(!s.is_dirty());
    }

    #[test]
    fn circle_commit_blur_and_undo() {
        let mut s = session_with(100, 100);
        let original = s.compositor().original().unwrap().clone();

        s.apply(&StrokeEvent::Brush {
            x: 50,
            y: 50,
            radius: 20,
        });
        s.end_stroke().unwrap();
        assert_eq!(s.history().len(), 2);

        let out = s.compositor().render(10, 1, false).unwrap();
        assert_ne!(out.get_pixel(50, 50), original.get_pixel(50, 50));
        assert_ne!(out.get_pixel(42, 57), original.get_pixel(42, 57));
        assert_eq!(out.get_pixel(50, 80), original.get_pixel(50, 80));
        assert_eq!(out.get_pixel(5, 5), original.get_pixel(5, 5));

        assert!(s.undo().unwrap());
        assert!(is_clear(s.current_mask().unwrap()));
        assert_eq!(s.compositor().render(10, 1, false).unwrap(), original);
    }

    #[test]
    fn new_edit_after_undo_drops_redo_branch() {
        let mut s = session_with(80, 80);

        s.apply(&StrokeEvent::Brush {
            x: 10,
            y: 10,
            radius: 5,
        });
        s.end_stroke().unwrap();
        let after_a = s.current_mask().unwrap().clone();

        s.apply(&StrokeEvent::Rectangle {
            x1: 40,
            y1: 40,
            x2: 60,
            y2: 60,
        });
        s.end_stroke().unwrap();

        assert!(s.undo().unwrap());
        assert_eq!(s.current_mask().unwrap(), &after_a);

        s.apply(&StrokeEvent::Ellipse {
            x1: 30,
            y1: 5,
            x2: 70,
            y2: 25,
        });
        s.end_stroke().unwrap();
        let after_c = s.current_mask().unwrap().clone();

        // Baseline, A, C.
        assert_eq!(s.history().len(), 3);
        assert!(!s.redo().unwrap());
        assert!(s.undo().unwrap());
        assert_eq!(s.current_mask().unwrap(), &after_a);
        assert!(s.redo().unwrap());
        assert_eq!(s.current_mask().unwrap(), &after_c);
    }

    #[test]
    fn seek_restores_thumbnail_state() {
        let mut s = session_with(60, 60);
        for i in 0..3 {
            s.apply(&StrokeEvent::Brush {
                x: 10 + i * 15,
                y: 30,
                radius: 4,
            });
            s.end_stroke().unwrap();
        }
        let last = s.current_mask().unwrap().clone();

        assert!(s.seek(0).unwrap());
        assert!(is_clear(s.current_mask().unwrap()));
        assert!(!s.seek(0).unwrap());
        assert!(!s.seek(99).unwrap());
        assert!(s.seek(3).unwrap());
        assert_eq!(s.current_mask().unwrap(), &last);
    }

    #[test]
    fn brush_uses_configured_size() {
        let mut s = session_with(50, 50);
        s.brush(25, 25);
        s.end_stroke().unwrap();
        let mask = s.current_mask().unwrap();
        // Default brush size 20 means radius 10.
        assert_eq!(mask.get_pixel(35, 25).0[0], 255);
        assert_eq!(mask.get_pixel(37, 25).0[0], 0);
    }

    #[test]
    fn cancelled_stroke_leaves_no_trace() {
        let mut s = session_with(30, 30);
        s.apply(&StrokeEvent::Line {
            x1: 0,
            y1: 0,
            x2: 29,
            y2: 29,
            thickness: 4,
        });
        assert_ne!(s.render_preview(), s.render_final());
        s.cancel_stroke();
        assert_eq!(s.render_preview(), s.render_final());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn detected_regions_form_one_entry() {
        let mut s = session_with(200, 100);
        s.apply_detected_regions(&[Region::new(10, 10, 30, 8), Region::new(120, 60, 50, 12)])
            .unwrap();
        assert_eq!(s.history().len(), 2);
        let mask = s.current_mask().unwrap();
        assert_eq!(mask.get_pixel(5, 5).0[0], 255);
        assert_eq!(mask.get_pixel(175, 77).0[0], 255);

        s.apply_detected_regions(&[]).unwrap();
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn reset_all_clears_and_restarts_history() {
        let mut s = session_with(40, 40);
        s.apply_to(
            &StrokeEvent::Brush {
                x: 20,
                y: 20,
                radius: 8,
            },
            MaskTarget::Committed,
        );
        s.end_stroke().unwrap();
        assert_eq!(s.history().len(), 2);

        s.reset_all().unwrap();
        assert!(is_clear(s.current_mask().unwrap()));
        assert_eq!(s.history().len(), 1);
        assert!(!s.undo().unwrap());
    }

    #[test]
    fn corrupt_history_falls_back_to_reset() {
        let mut s = session_with(40, 40);
        s.brush(20, 20);
        s.end_stroke().unwrap();

        let good = PatchExtractor::extract(s.current_mask().unwrap()).unwrap();
        let broken = CompressedPatch::from_parts(good[0].rect(), vec![0, 1, 2], *good[0].digest());
        s.history = HistoryStore::new(5);
        s.history.push(vec![broken], None);
        s.history.push(good, None);

        let err = s.undo().unwrap_err();
        assert!(matches!(err, RedactwerkError::CorruptPatch(_)));
        assert!(is_clear(s.current_mask().unwrap()));
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn unloaded_session_is_inert() {
        let mut s = DocumentSession::default();
        s.brush(1, 1);
        s.end_stroke().unwrap();
        s.reset_all().unwrap();
        s.apply_detected_regions(&[Region::new(0, 0, 5, 5)]).unwrap();
        assert!(!s.undo().unwrap());
        assert!(!s.redo().unwrap());
        assert!(!s.seek(0).unwrap());
        assert!(s.render_preview().is_none());
        assert!(s.history().is_empty());
        assert!(matches!(
            s.save(&MemorySink::default()),
            Err(RedactwerkError::NoDocument)
        ));
        assert!(!s.autosave(&MemorySink::default(), &SaveGuard::new()).unwrap());
    }

    #[test]
    fn failed_load_keeps_current_document() {
        let mut s = session_with(20, 20);
        s.brush(10, 10);
        s.end_stroke().unwrap();
        let id = s.id();

        let err = s.load(DynamicImage::new_rgb8(0, 0)).unwrap_err();
        assert!(matches!(err, RedactwerkError::Load(LoadError::Empty)));
        assert_eq!(s.id(), id);
        assert_eq!(s.history().len(), 2);

        let err = s.load_raw(2, 2, 5, vec![0; 20]).unwrap_err();
        assert!(matches!(err, RedactwerkError::Load(LoadError::UnsupportedChannels(5))));
    }

    #[test]
    fn save_marks_clean_but_autosave_does_not() {
        let mut s = session_with(30, 30);
        s.brush(15, 15);
        s.end_stroke().unwrap();
        assert!(s.is_dirty());

        let sink = MemorySink::default();
        assert!(s.autosave(&sink, &SaveGuard::new()).unwrap());
        assert!(s.is_dirty());

        s.save(&sink).unwrap();
        assert!(!s.is_dirty());
        assert_eq!(sink.saved.borrow().len(), 2);
        assert_eq!(sink.saved.borrow()[0], sink.saved.borrow()[1]);
    }

    #[test]
    fn autosave_respects_in_flight_guard() {
        let s = session_with(10, 10);
        let guard = SaveGuard::new();
        let _held = guard.try_begin().unwrap();

        let sink = MemorySink::default();
        assert!(!s.autosave(&sink, &guard).unwrap());
        assert!(sink.saved.borrow().is_empty());
    }

    #[test]
    fn opened_file_autosaves_beside_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("form.png");
        checkerboard(16, 12).save(&source).unwrap();

        let mut s = DocumentSession::default();
        s.open(&source).unwrap();
        assert_eq!(s.source(), Some(source.as_path()));

        let sink = s.autosave_sink().unwrap();
        assert_eq!(sink.path(), dir.path().join("form_autosave.png"));
        assert!(s.autosave(&sink, &SaveGuard::new()).unwrap());
        assert!(sink.path().exists());
    }

    #[test]
    fn unreadable_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = DocumentSession::default();
        let err = s.open(dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, RedactwerkError::Load(LoadError::Decode(_))));
        assert!(!s.is_loaded());
    }
}
