// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// History strip thumbnails. Each history entry carries at most one; they are
// truncated and evicted together with their entry.

use image::imageops::{self, FilterType};

use crate::PixelBuffer;

/// Default thumbnail bounds for the history strip.
pub const DEFAULT_THUMBNAIL_SIZE: (u32, u32) = (100, 75);

/// A small preview of one committed state.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    image: PixelBuffer,
}

impl Thumbnail {
    /// Downscale `render` to fit within `max_width` x `max_height`, preserving
    /// aspect ratio. Images already small enough are kept at their size.
    pub fn from_render(render: &PixelBuffer, max_width: u32, max_height: u32) -> Self {
        let (w, h) = fit_within(render.width(), render.height(), max_width, max_height);
        let image = if (w, h) == render.dimensions() {
            render.clone()
        } else {
            imageops::resize(render, w, h, FilterType::Lanczos3)
        };
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &PixelBuffer {
        &self.image
    }

    pub fn into_image(self) -> PixelBuffer {
        self.image
    }
}

/// Largest size no bigger than `max_w` x `max_h` with the aspect ratio of
/// `w` x `h`. Never upscales; each side is at least one pixel.
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (w, h);
    }
    if w <= max_w && h <= max_h {
        return (w, h);
    }
    let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    let new_w = ((w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let new_h = ((h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (new_w, new_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn landscape_is_width_bound() {
        assert_eq!(fit_within(800, 400, 100, 75), (100, 50));
    }

    #[test]
    fn portrait_is_height_bound() {
        assert_eq!(fit_within(300, 600, 100, 75), (38, 75));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        assert_eq!(fit_within(40, 30, 100, 75), (40, 30));
    }

    #[test]
    fn thin_strip_keeps_one_pixel() {
        assert_eq!(fit_within(10_000, 1, 100, 75), (100, 1));
    }

    #[test]
    fn thumbnail_fits_bounds() {
        let render = PixelBuffer::from_pixel(640, 480, Rgb([10, 20, 30]));
        let thumb = Thumbnail::from_render(&render, 100, 75);
        assert_eq!((thumb.width(), thumb.height()), (100, 75));
        assert_eq!(thumb.as_image().get_pixel(50, 30), &Rgb([10, 20, 30]));
    }
}
