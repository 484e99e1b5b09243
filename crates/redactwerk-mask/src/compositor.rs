// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction compositor — owns the original pixels, the committed mask, and the
// transient stroke mask, and produces blurred previews and final renders.
//
// Every operation on an unloaded compositor is a no-op; `load` is the only
// call that reports a structured error.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, Rgba};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut};
use imageproc::filter::separable_filter_equal;
use imageproc::rect::Rect;
use redactwerk_core::error::{LoadError, RedactwerkError, Result};
use redactwerk_core::types::{BlurSettings, MaskShape, MaskTarget, Region};
use tracing::{debug, info, instrument};

use crate::patch::PatchRect;
use crate::thumbnail::Thumbnail;
use crate::{Mask, PixelBuffer};

/// Padding added around each detected sensitive region.
pub const DETECTION_MARGIN: u32 = 5;

/// Mask value for a redacted pixel.
const ON: Luma<u8> = Luma([255]);

/// The loaded document: pixels plus both masks, always the same dimensions.
struct Layers {
    original: PixelBuffer,
    mask: Mask,
    transient: Mask,
}

impl Layers {
    fn new(original: PixelBuffer) -> Self {
        let (w, h) = original.dimensions();
        Self {
            original,
            mask: GrayImage::new(w, h),
            transient: GrayImage::new(w, h),
        }
    }

    fn target_mut(&mut self, target: MaskTarget) -> &mut Mask {
        match target {
            MaskTarget::Committed => &mut self.mask,
            MaskTarget::Temporary => &mut self.transient,
        }
    }

    /// `mask | transient` for previews, `mask` otherwise.
    fn effective_mask(&self, preview: bool) -> Cow<'_, Mask> {
        if !preview {
            return Cow::Borrowed(&self.mask);
        }
        let mut combined = self.mask.clone();
        for (m, t) in combined.pixels_mut().zip(self.transient.pixels()) {
            m.0[0] |= t.0[0];
        }
        Cow::Owned(combined)
    }
}

/// Holds the authoritative image/mask state and produces pixel output.
///
/// Not thread-safe: meant to be owned and mutated by a single document
/// thread. Rendering borrows immutably and has no side effects.
#[derive(Default)]
pub struct Compositor {
    layers: Option<Layers>,
    dirty: bool,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Loading --------------------------------------------------------------

    /// Make `buffer` the current document, forcing it to 3-channel RGB.
    ///
    /// Both masks are zero-filled. On error the previous document, if any, is
    /// left untouched.
    #[instrument(skip_all, fields(width = buffer.width(), height = buffer.height()))]
    pub fn load(&mut self, buffer: DynamicImage) -> std::result::Result<(), LoadError> {
        if buffer.width() == 0 || buffer.height() == 0 {
            return Err(LoadError::Empty);
        }
        let rgb = match buffer {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };
        self.install(rgb);
        Ok(())
    }

    /// Load interleaved 8-bit pixel data with 1 (gray), 3 (RGB), or 4 (RGBA)
    /// channels. Alpha is dropped.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn load_raw(
        &mut self,
        width: u32,
        height: u32,
        channels: u8,
        bytes: Vec<u8>,
    ) -> std::result::Result<(), LoadError> {
        if width == 0 || height == 0 || bytes.is_empty() {
            return Err(LoadError::Empty);
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(LoadError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if bytes.len() != expected {
            return Err(LoadError::BufferSize {
                expected,
                actual: bytes.len(),
            });
        }

        let size_error = || LoadError::BufferSize {
            expected,
            actual: expected,
        };
        let image = match channels {
            1 => DynamicImage::ImageLuma8(
                ImageBuffer::<Luma<u8>, _>::from_raw(width, height, bytes).ok_or_else(size_error)?,
            ),
            3 => DynamicImage::ImageRgb8(
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, bytes).ok_or_else(size_error)?,
            ),
            _ => DynamicImage::ImageRgba8(
                ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, bytes).ok_or_else(size_error)?,
            ),
        };
        self.load(image)
    }

    fn install(&mut self, rgb: PixelBuffer) {
        info!(width = rgb.width(), height = rgb.height(), "Document loaded into compositor");
        self.layers = Some(Layers::new(rgb));
        self.dirty = false;
    }

    // -- Accessors ------------------------------------------------------------

    pub fn is_loaded(&self) -> bool {
        self.layers.is_some()
    }

    /// Document dimensions, or `None` when nothing is loaded.
    pub fn dimensions(&self) -> Option<MaskShape> {
        self.layers
            .as_ref()
            .map(|l| MaskShape::new(l.original.width(), l.original.height()))
    }

    /// The unmodified pixels.
    pub fn original(&self) -> Option<&PixelBuffer> {
        self.layers.as_ref().map(|l| &l.original)
    }

    /// The committed mask, for history capture or external persistence.
    pub fn current_mask(&self) -> Option<&Mask> {
        self.layers.as_ref().map(|l| &l.mask)
    }

    /// The in-progress stroke mask.
    pub fn transient_mask(&self) -> Option<&Mask> {
        self.layers.as_ref().map(|l| &l.transient)
    }

    /// Whether the committed mask changed since the last [`mark_clean`].
    ///
    /// [`mark_clean`]: Self::mark_clean
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // -- Painting -------------------------------------------------------------

    /// Paint a filled circle. Parts outside the image are clipped.
    pub fn add_stroke(&mut self, x: i32, y: i32, radius: i32, target: MaskTarget) {
        let Some(layers) = self.layers.as_mut() else {
            return;
        };
        let (w, h) = layers.original.dimensions();
        let (radius, lo, hi_x, hi_y) = stamp_bounds(radius, w, h);
        let center = (x.clamp(lo, hi_x), y.clamp(lo, hi_y));
        draw_filled_circle_mut(layers.target_mut(target), center, radius, ON);
        self.touch(target);
    }

    /// Paint a thick segment from `(x1, y1)` to `(x2, y2)` by stamping circles
    /// of diameter `thickness` along it.
    pub fn add_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, thickness: i32, target: MaskTarget) {
        let Some(layers) = self.layers.as_mut() else {
            return;
        };
        let (w, h) = layers.original.dimensions();
        // Keep far-off pointer samples from producing unbounded walks.
        let (radius, lo, hi_x, hi_y) = stamp_bounds(thickness / 2, w, h);
        let (x1, x2) = (x1.clamp(lo, hi_x), x2.clamp(lo, hi_x));
        let (y1, y2) = (y1.clamp(lo, hi_y), y2.clamp(lo, hi_y));

        let steps = (x2 - x1).abs().max((y2 - y1).abs()).max(1);
        let canvas = layers.target_mut(target);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = (x1 as f32 + (x2 - x1) as f32 * t).round() as i32;
            let y = (y1 as f32 + (y2 - y1) as f32 * t).round() as i32;
            draw_filled_circle_mut(canvas, (x, y), radius, ON);
        }
        self.touch(target);
    }

    /// Paint a filled rectangle with inclusive corners. Corners are clamped to
    /// the image and normalised before rasterising.
    pub fn add_rectangle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, target: MaskTarget) {
        let Some(layers) = self.layers.as_mut() else {
            return;
        };
        let (w, h) = layers.original.dimensions();
        let (left, top, right, bottom) = clamp_box(x1, y1, x2, y2, w, h);
        let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_filled_rect_mut(layers.target_mut(target), rect, ON);
        self.touch(target);
    }

    /// Paint a filled ellipse inscribed in the clamped, normalised box.
    pub fn add_ellipse(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, target: MaskTarget) {
        let Some(layers) = self.layers.as_mut() else {
            return;
        };
        let (w, h) = layers.original.dimensions();
        let (left, top, right, bottom) = clamp_box(x1, y1, x2, y2, w, h);
        let center = ((left + right) / 2, (top + bottom) / 2);
        let rx = (right - left) / 2;
        let ry = (bottom - top) / 2;

        let canvas = layers.target_mut(target);
        if rx == 0 || ry == 0 {
            // Degenerate ellipse: a straight run of pixels.
            let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
            draw_filled_rect_mut(canvas, rect, ON);
        } else {
            draw_filled_ellipse_mut(canvas, center, rx, ry, ON);
        }
        self.touch(target);
    }

    /// Paint detected sensitive regions, each padded by [`DETECTION_MARGIN`].
    #[instrument(skip(self, regions), fields(count = regions.len()))]
    pub fn add_regions(&mut self, regions: &[Region], target: MaskTarget) {
        if self.layers.is_none() {
            return;
        }
        for region in regions {
            let r = region.padded(DETECTION_MARGIN);
            let right = r.x.saturating_add(i32::try_from(r.width).unwrap_or(i32::MAX));
            let bottom = r.y.saturating_add(i32::try_from(r.height).unwrap_or(i32::MAX));
            self.add_rectangle(r.x, r.y, right, bottom, target);
        }
        debug!(count = regions.len(), "Detected regions painted");
    }

    fn touch(&mut self, target: MaskTarget) {
        if target == MaskTarget::Committed {
            self.dirty = true;
        }
    }

    // -- Mask lifecycle -------------------------------------------------------

    /// Merge the transient mask into the committed mask and clear it.
    pub fn commit(&mut self) {
        let Some(layers) = self.layers.as_mut() else {
            return;
        };
        for (m, t) in layers.mask.pixels_mut().zip(layers.transient.pixels()) {
            m.0[0] |= t.0[0];
        }
        let (w, h) = layers.transient.dimensions();
        layers.transient = GrayImage::new(w, h);
        self.dirty = true;
        debug!("Transient mask committed");
    }

    /// Throw away the in-progress stroke.
    pub fn clear_transient(&mut self) {
        if let Some(layers) = self.layers.as_mut() {
            let (w, h) = layers.transient.dimensions();
            layers.transient = GrayImage::new(w, h);
        }
    }

    /// Replace the committed mask, e.g. with a state rebuilt from history.
    pub fn set_mask(&mut self, mask: Mask) -> Result<()> {
        let Some(layers) = self.layers.as_mut() else {
            return Err(RedactwerkError::NoDocument);
        };
        if mask.dimensions() != layers.original.dimensions() {
            return Err(RedactwerkError::DimensionMismatch {
                expected_width: layers.original.width(),
                expected_height: layers.original.height(),
                actual_width: mask.width(),
                actual_height: mask.height(),
            });
        }
        layers.mask = mask;
        self.dirty = true;
        Ok(())
    }

    /// Clear both masks. The original pixels stay; history is the caller's.
    pub fn reset(&mut self) {
        if let Some(layers) = self.layers.as_mut() {
            let (w, h) = layers.original.dimensions();
            layers.mask = GrayImage::new(w, h);
            layers.transient = GrayImage::new(w, h);
            self.dirty = true;
            info!("Compositor masks reset");
        }
    }

    // -- Rendering ------------------------------------------------------------

    /// Composite the blurred image through the mask.
    ///
    /// With `preview` the transient stroke is included. An all-zero mask
    /// returns the original pixels without blurring. Otherwise the masked area
    /// (plus a `max(5, 2 * intensity)` margin) is blurred `iterations` times
    /// with a `2 * intensity + 1` kernel and blended per channel as
    /// `original * (1 - m) + blurred * m`, `m = mask / 255`.
    #[instrument(skip(self))]
    pub fn render(&self, intensity: u32, iterations: u32, preview: bool) -> Option<PixelBuffer> {
        let layers = self.layers.as_ref()?;
        let effective = layers.effective_mask(preview);

        let Some(bounds) = mask_bounds(&effective) else {
            debug!("Empty mask, returning original");
            return Some(layers.original.clone());
        };

        let (w, h) = layers.original.dimensions();
        let margin = intensity.saturating_mul(2).max(5);
        let roi = bounds.grown(margin, w, h);

        let region =
            image::imageops::crop_imm(&layers.original, roi.x, roi.y, roi.width, roi.height).to_image();
        let blurred = blur(region, intensity, iterations);

        let mut out = layers.original.clone();
        for (bx, by, blurred_px) in blurred.enumerate_pixels() {
            let (x, y) = (roi.x + bx, roi.y + by);
            let m = effective.get_pixel(x, y).0[0];
            if m == 0 {
                continue;
            }
            let alpha = m as f32 / 255.0;
            let px = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let v = px.0[c] as f32 * (1.0 - alpha) + blurred_px.0[c] as f32 * alpha;
                px.0[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }

        debug!(roi_w = roi.width, roi_h = roi.height, "Composite rendered");
        Some(out)
    }

    /// Render with `blur` and without the transient stroke.
    pub fn render_final(&self, blur: BlurSettings) -> Option<PixelBuffer> {
        self.render(blur.intensity, blur.iterations, false)
    }

    /// A history-strip preview of the committed state, rendered with the
    /// default blur settings.
    pub fn thumbnail(&self, max_width: u32, max_height: u32) -> Option<Thumbnail> {
        let render = self.render_final(BlurSettings::default())?;
        Some(Thumbnail::from_render(&render, max_width, max_height))
    }
}

/// Clamp a circle radius into `0..=w + h` (already enough to cover the image)
/// and return it with the range a centre can take and still touch the image:
/// `(radius, lo, hi_x, hi_y)`, the same `lo` for both axes.
fn stamp_bounds(radius: i32, w: u32, h: u32) -> (i32, i32, i32, i32) {
    let reach = i32::try_from(w.saturating_add(h)).unwrap_or(i32::MAX);
    let radius = radius.clamp(0, reach);
    let lo = (-radius).saturating_sub(1);
    let hi_x = i32::try_from(w).unwrap_or(i32::MAX).saturating_add(radius);
    let hi_y = i32::try_from(h).unwrap_or(i32::MAX).saturating_add(radius);
    (radius, lo, hi_x, hi_y)
}

/// Normalise two corners and clamp them into a `w` x `h` image.
fn clamp_box(x1: i32, y1: i32, x2: i32, y2: i32, w: u32, h: u32) -> (i32, i32, i32, i32) {
    let max_x = w as i32 - 1;
    let max_y = h as i32 - 1;
    let (x1, x2) = (x1.clamp(0, max_x), x2.clamp(0, max_x));
    let (y1, y2) = (y1.clamp(0, max_y), y2.clamp(0, max_y));
    (x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
}

/// Bounding box of all nonzero pixels, or `None` for an all-zero mask.
fn mask_bounds(mask: &Mask) -> Option<PatchRect> {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, px) in mask.enumerate_pixels() {
        if px.0[0] != 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    (min_x != u32::MAX).then(|| PatchRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Repeated Gaussian blur with a `2 * intensity + 1` kernel.
///
/// The sigma follows the usual derivation from kernel size,
/// `0.3 * ((k - 1) / 2 - 1) + 0.8`. A one-pixel kernel is the identity.
fn blur(mut image: PixelBuffer, intensity: u32, iterations: u32) -> PixelBuffer {
    if intensity == 0 || iterations == 0 {
        return image;
    }
    let kernel = gaussian_kernel(intensity, image.width().max(image.height()));
    for _ in 0..iterations {
        image = separable_filter_equal(&image, &kernel);
    }
    image
}

/// Normalised 1-D Gaussian with `2 * intensity + 1` taps.
///
/// Taps further out than `max_radius` would only sample the replicated
/// border, so the kernel is cut there.
fn gaussian_kernel(intensity: u32, max_radius: u32) -> Vec<f32> {
    let sigma = 0.3 * (intensity as f32 - 1.0) + 0.8;
    let radius = intensity.min(max_radius.max(1)) as i64;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|d| (-((d * d) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}
