// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compressed mask patches — one DEFLATE-compressed rectangular slice of a
// mask, fingerprinted with SHA-256 so corruption is caught on the way back.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use redactwerk_core::error::{RedactwerkError, Result};
use sha2::{Digest, Sha256};

use crate::Mask;

/// Axis-aligned rectangle in mask coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PatchRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow by `margin` on every side, clipped to a `max_w` x `max_h` canvas.
    pub fn grown(&self, margin: u32, max_w: u32, max_h: u32) -> Self {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        let right = self.x.saturating_add(self.width).saturating_add(margin).min(max_w);
        let bottom = self.y.saturating_add(self.height).saturating_add(margin).min(max_h);
        Self {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An immutable, compressed copy of one rectangular region of a mask.
///
/// Created by the patch extractor and owned by exactly one history entry.
#[derive(Clone)]
pub struct CompressedPatch {
    rect: PatchRect,
    /// zlib stream of the `width * height` raw mask bytes.
    data: Vec<u8>,
    /// SHA-256 of the raw bytes.
    digest: [u8; 32],
}

impl CompressedPatch {
    /// Compress `region`, which sits at `(x, y)` in its parent mask.
    pub fn compress(x: u32, y: u32, region: &Mask) -> Result<Self> {
        let raw = region.as_raw();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw)?;
        let data = encoder.finish()?;

        Ok(Self {
            rect: PatchRect::new(x, y, region.width(), region.height()),
            data,
            digest: sha256(raw),
        })
    }

    /// Rebuild a patch from stored parts, e.g. when history is restored from
    /// an external store. The parts are verified on [`decompress`].
    ///
    /// [`decompress`]: Self::decompress
    pub fn from_parts(rect: PatchRect, data: Vec<u8>, digest: [u8; 32]) -> Self {
        Self { rect, data, digest }
    }

    /// Inflate the patch back into a `width` x `height` mask.
    ///
    /// Any mismatch (bad stream, wrong length, wrong digest) is reported as
    /// `RedactwerkError::CorruptPatch`; a damaged patch is never blitted.
    pub fn decompress(&self) -> Result<Mask> {
        let expected = self.rect.area();
        let mut raw = Vec::with_capacity(expected);
        ZlibDecoder::new(self.data.as_slice())
            .read_to_end(&mut raw)
            .map_err(|err| {
                RedactwerkError::CorruptPatch(format!("inflate failed at {:?}: {}", self.rect, err))
            })?;

        if raw.len() != expected {
            return Err(RedactwerkError::CorruptPatch(format!(
                "patch at {:?} inflated to {} bytes, expected {}",
                self.rect,
                raw.len(),
                expected
            )));
        }

        let actual = sha256(&raw);
        if actual != self.digest {
            return Err(RedactwerkError::CorruptPatch(format!(
                "digest mismatch: expected {}, got {}",
                hex::encode(self.digest),
                hex::encode(actual)
            )));
        }

        Mask::from_raw(self.rect.width, self.rect.height, raw).ok_or_else(|| {
            RedactwerkError::CorruptPatch(format!("cannot shape patch {:?}", self.rect))
        })
    }

    pub fn rect(&self) -> PatchRect {
        self.rect
    }

    pub fn x(&self) -> u32 {
        self.rect.x
    }

    pub fn y(&self) -> u32 {
        self.rect.y
    }

    pub fn width(&self) -> u32 {
        self.rect.width
    }

    pub fn height(&self) -> u32 {
        self.rect.height
    }

    /// Compressed payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the compressed payload in bytes.
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Lowercase hex form of the digest, for logs.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl std::fmt::Debug for CompressedPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedPatch")
            .field("rect", &self.rect)
            .field("compressed_len", &self.data.len())
            .finish()
    }
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
