// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Patch extraction — split a mask into the bounding boxes of its connected
// regions and compress each box.

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};
use redactwerk_core::error::Result;
use tracing::{debug, instrument};

use crate::Mask;
use crate::patch::{CompressedPatch, PatchRect};

/// Diffs a mask into bounding-box patches for the history store.
///
/// Every nonzero pixel lies in at least one box and each box is copied from
/// the same mask, so blitting the patches onto a zero mask in any order
/// reproduces the input exactly, even when boxes of nested regions overlap.
pub struct PatchExtractor;

impl PatchExtractor {
    /// Bounding boxes of the 8-connected nonzero regions of `mask`, in label
    /// order (first pixel of each region in raster order).
    pub fn bounding_boxes(mask: &Mask) -> Vec<PatchRect> {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        // (min_x, min_y, max_x, max_y), indexed by label - 1.
        let mut bounds: Vec<(u32, u32, u32, u32)> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if bounds.len() < label {
                bounds.resize(label, (u32::MAX, u32::MAX, 0, 0));
            }
            let b = &mut bounds[label - 1];
            b.0 = b.0.min(x);
            b.1 = b.1.min(y);
            b.2 = b.2.max(x);
            b.3 = b.3.max(y);
        }

        bounds
            .into_iter()
            .filter(|b| b.0 != u32::MAX)
            .map(|(x0, y0, x1, y1)| PatchRect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
            .collect()
    }

    /// Extract and compress one patch per connected region.
    #[instrument(skip(mask), fields(width = mask.width(), height = mask.height()))]
    pub fn extract(mask: &Mask) -> Result<Vec<CompressedPatch>> {
        let boxes = Self::bounding_boxes(mask);

        let mut patches = Vec::with_capacity(boxes.len());
        for rect in boxes {
            let region = image::imageops::crop_imm(mask, rect.x, rect.y, rect.width, rect.height)
                .to_image();
            patches.push(CompressedPatch::compress(rect.x, rect.y, &region)?);
        }

        debug!(
            patches = patches.len(),
            compressed_bytes = patches.iter().map(CompressedPatch::compressed_len).sum::<usize>(),
            "Mask patches extracted"
        );
        Ok(patches)
    }
}
