//! Screenshot comparison
//!
//! Pixel-level diff used by the local analysis client and the cross-browser
//! checker. Identical encodings short-circuit on their SHA-256.

use image::{GenericImageView, Pixel, RgbaImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use tracing::debug;

use crate::inspector::{Rect, Screenshot};

/// Per-channel difference tolerated for anti-aliasing and compression
const TOLERANCE: i32 = 5;

/// Cells per side of the grid used to localise differences
const GRID: u32 = 4;

/// Result of comparing two screenshots
#[derive(Debug, Clone)]
pub struct PixelDiff {
    /// 0-100, share of pixels that match within tolerance
    pub match_percentage: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub expected_hash: String,
    pub actual_hash: String,
    /// Grid cells (in expected-image pixels) containing differing pixels, worst first
    pub regions: Vec<DiffRegion>,
    /// Red-on-dimmed diff image, present when any pixel differs
    pub diff_png: Option<Vec<u8>>,
}

impl PixelDiff {
    pub fn identical(&self) -> bool {
        self.diff_pixels == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffRegion {
    pub rect: Rect,
    /// Share of the cell's pixels that differ, 0-100
    pub diff_percentage: f64,
}

pub fn hash_png(png: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(png);
    hex::encode(hasher.finalize())
}

/// Compare `actual` against `expected`
///
/// When dimensions differ, pixels outside the overlap count as different.
pub fn compare(expected: &Screenshot, actual: &Screenshot) -> Result<PixelDiff, image::ImageError> {
    let expected_hash = hash_png(&expected.png);
    let actual_hash = hash_png(&actual.png);

    let expected_img = image::load_from_memory(&expected.png)?;
    let actual_img = image::load_from_memory(&actual.png)?;
    let (ew, eh) = expected_img.dimensions();
    let (aw, ah) = actual_img.dimensions();
    let width = ew.max(aw);
    let height = eh.max(ah);
    let total_pixels = width as u64 * height as u64;

    if expected_hash == actual_hash {
        debug!("Screenshots match exactly (same hash)");
        return Ok(PixelDiff {
            match_percentage: 100.0,
            diff_pixels: 0,
            total_pixels,
            expected_hash,
            actual_hash,
            regions: Vec::new(),
            diff_png: None,
        });
    }

    if (ew, eh) != (aw, ah) {
        debug!("Screenshot dimensions differ: expected {}x{} vs actual {}x{}", ew, eh, aw, ah);
    }

    let expected_rgba = expected_img.to_rgba8();
    let actual_rgba = actual_img.to_rgba8();
    let mut diff_img = RgbaImage::new(width, height);
    let cell_w = width.div_ceil(GRID).max(1);
    let cell_h = height.div_ceil(GRID).max(1);
    let mut cell_diffs = vec![0u64; (GRID * GRID) as usize];
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let differs = if x < ew.min(aw) && y < eh.min(ah) {
                let a = actual_rgba.get_pixel(x, y);
                pixels_differ(a, expected_rgba.get_pixel(x, y))
            } else {
                true
            };

            if differs {
                diff_pixels += 1;
                let cell = (y / cell_h).min(GRID - 1) * GRID + (x / cell_w).min(GRID - 1);
                cell_diffs[cell as usize] += 1;
                diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            } else {
                let c = actual_rgba.get_pixel(x, y).channels();
                diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
            }
        }
    }

    let match_percentage = if total_pixels == 0 {
        100.0
    } else {
        100.0 - (diff_pixels as f64 / total_pixels as f64) * 100.0
    };

    let mut regions: Vec<DiffRegion> = cell_diffs
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(index, &count)| {
            let index = index as u32;
            let x = (index % GRID) * cell_w;
            let y = (index / GRID) * cell_h;
            let w = cell_w.min(width.saturating_sub(x));
            let h = cell_h.min(height.saturating_sub(y));
            let area = (w as u64 * h as u64).max(1);
            DiffRegion {
                rect: Rect {
                    x: x as f64,
                    y: y as f64,
                    width: w as f64,
                    height: h as f64,
                },
                diff_percentage: count as f64 / area as f64 * 100.0,
            }
        })
        .collect();
    regions.sort_by(|a, b| b.diff_percentage.total_cmp(&a.diff_percentage));

    let diff_png = if diff_pixels > 0 {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(diff_img).write_to(&mut buf, image::ImageOutputFormat::Png)?;
        Some(buf.into_inner())
    } else {
        None
    };

    Ok(PixelDiff {
        match_percentage,
        diff_pixels,
        total_pixels,
        expected_hash,
        actual_hash,
        regions,
        diff_png,
    })
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > TOLERANCE)
}

#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(png: Vec<u8>) -> Screenshot {
        Screenshot::from_png(png).unwrap()
    }

    #[test]
    fn test_identical_short_circuits() {
        let a = shot(solid_png(8, 8, [10, 20, 30, 255]));
        let diff = compare(&a, &a.clone()).unwrap();
        assert!(diff.identical());
        assert_eq!(diff.match_percentage, 100.0);
        assert!(diff.diff_png.is_none());
    }

    #[test]
    fn test_within_tolerance_matches() {
        let a = shot(solid_png(8, 8, [100, 100, 100, 255]));
        let b = shot(solid_png(8, 8, [104, 97, 100, 255]));
        let diff = compare(&a, &b).unwrap();
        assert_ne!(diff.expected_hash, diff.actual_hash);
        assert_eq!(diff.diff_pixels, 0);
        assert_eq!(diff.match_percentage, 100.0);
    }

    #[test]
    fn test_half_different() {
        let mut img = RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 0, 255]));
        for y in 0..8 {
            for x in 4..8 {
                img.put_pixel(x, y, image::Rgba([255, 255, 255, 255]));
            }
        }
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();

        let expected = shot(solid_png(8, 8, [0, 0, 0, 255]));
        let actual = shot(buf.into_inner());
        let diff = compare(&expected, &actual).unwrap();
        assert_eq!(diff.diff_pixels, 32);
        assert!((diff.match_percentage - 50.0).abs() < 1e-9);
        assert!(diff.diff_png.is_some());
        assert_eq!(diff.regions.len(), 8);
        assert!(diff.regions.iter().all(|r| r.rect.x >= 4.0));
    }

    #[test]
    fn test_size_mismatch_counts_missing_area() {
        let expected = shot(solid_png(10, 10, [0, 0, 0, 255]));
        let actual = shot(solid_png(10, 5, [0, 0, 0, 255]));
        let diff = compare(&expected, &actual).unwrap();
        assert_eq!(diff.total_pixels, 100);
        assert_eq!(diff.diff_pixels, 50);
    }
}
