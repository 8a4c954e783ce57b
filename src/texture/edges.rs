//! Edge-intensity map of the rasterized texture.
//!
//! Built once per export, read-only afterwards. The pipeline is:
//!
//! 1. grayscale, with transparency composited over the background color
//! 2. 3x3 mean blur (edges clamped)
//! 3. Sobel gradient magnitude
//! 4. `magnitude^0.6` to lift weak edges
//! 5. normalisation by the 90th percentile of the nonzero values, clamped to `[0, 1]`
//!
//! Lookups take UV coordinates: `u` grows to the right, `v` grows upward
//! (the opposite of raster rows).

use image::RgbaImage;
use rayon::prelude::*;

use crate::config::Color;

/// Exponent applied to the Sobel magnitude.
pub const EDGE_GAMMA: f32 = 0.6;

/// Percentile of nonzero magnitudes mapped to full intensity.
pub const NORMALIZE_PERCENTILE: f64 = 0.9;

/// Values at or below this count as "no edge".
const ZERO: f32 = 1e-6;

/// A grid of edge intensities in `[0, 1]`, one per texture pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl EdgeMap {
    /// Wrap precomputed intensities (row-major, top row first).
    ///
    /// Values are clamped to `[0, 1]`. Returns `None` if `data` does not
    /// match the dimensions or either dimension is zero.
    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return None;
        }
        let data = data.into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Detect edges in an RGBA image.
    pub fn from_image(image: &RgbaImage, background: Color, parallel: bool) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return Self {
                width: 1,
                height: 1,
                data: vec![0.0],
            };
        }

        let [br, bg, bb, _] = background.to_rgba();
        let background_luma = luma(br, bg, bb);
        let gray: Vec<f32> = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                let alpha = a as f32 / 255.0;
                luma(r, g, b) * alpha + background_luma * (1.0 - alpha)
            })
            .collect();

        let blurred = filter_rows(width, height, parallel, |x, y| {
            let mut sum = 0.0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    sum += clamped(&gray, width, height, x as isize + dx, y as isize + dy);
                }
            }
            sum / 9.0
        });

        let magnitude = filter_rows(width, height, parallel, |x, y| {
            let at = |dx: isize, dy: isize| clamped(&blurred, width, height, x as isize + dx, y as isize + dy);
            let gx = (at(1, -1) + 2.0 * at(1, 0) + at(1, 1)) - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1));
            let gy = (at(-1, 1) + 2.0 * at(0, 1) + at(1, 1)) - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1));
            (gx * gx + gy * gy).sqrt().powf(EDGE_GAMMA)
        });

        let mut nonzero: Vec<f32> = magnitude.iter().copied().filter(|&m| m > ZERO).collect();
        if nonzero.is_empty() {
            log::warn!("edge map is flat; texture has no detail to refine");
            return Self {
                width,
                height,
                data: vec![0.0; width * height],
            };
        }
        nonzero.sort_by(f32::total_cmp);
        let rank = ((nonzero.len() - 1) as f64 * NORMALIZE_PERCENTILE).round() as usize;
        let scale = nonzero[rank].max(ZERO);

        let data = magnitude.into_iter().map(|m| (m / scale).clamp(0.0, 1.0)).collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Intensity at pixel `(x, y)`, row 0 at the top.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Largest intensity in the map.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Bilinear lookup at a UV coordinate.
    pub fn sample(&self, u: f64, v: f64) -> f32 {
        let fx = (u.clamp(0.0, 1.0) * self.width as f64 - 0.5).max(0.0);
        let fy = ((1.0 - v.clamp(0.0, 1.0)) * self.height as f64 - 0.5).max(0.0);

        let x0 = (fx.floor() as usize).min(self.width - 1);
        let y0 = (fy.floor() as usize).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = (fx - x0 as f64).clamp(0.0, 1.0) as f32;
        let ty = (fy - y0 as f64).clamp(0.0, 1.0) as f32;

        let top = self.get(x0, y0) * (1.0 - tx) + self.get(x1, y0) * tx;
        let bottom = self.get(x0, y1) * (1.0 - tx) + self.get(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }

    /// UV coordinate of the centre of pixel `(x, y)`.
    pub fn pixel_uv(&self, x: usize, y: usize) -> (f64, f64) {
        (
            (x as f64 + 0.5) / self.width as f64,
            1.0 - (y as f64 + 0.5) / self.height as f64,
        )
    }

    /// UV centres of all pixels whose intensity exceeds `threshold`, in raster order.
    #[cfg(test)]
    pub(crate) fn hot_pixels(&self, threshold: f32) -> Vec<(f64, f64)> {
        let mut hot = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) > threshold {
                    hot.push(self.pixel_uv(x, y));
                }
            }
        }
        hot
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> f32 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0
}

#[inline]
fn clamped(data: &[f32], width: usize, height: usize, x: isize, y: isize) -> f32 {
    let x = x.clamp(0, width as isize - 1) as usize;
    let y = y.clamp(0, height as isize - 1) as usize;
    data[y * width + x]
}

/// Evaluate `f` at every pixel, one row per task when `parallel` is set.
fn filter_rows<F>(width: usize, height: usize, parallel: bool, f: F) -> Vec<f32>
where
    F: Fn(usize, usize) -> f32 + Sync,
{
    let row = |y: usize| (0..width).map(|x| f(x, y)).collect::<Vec<f32>>();
    let rows: Vec<Vec<f32>> = if parallel {
        (0..height).into_par_iter().map(row).collect()
    } else {
        (0..height).map(row).collect()
    };
    rows.into_iter().flatten().collect()
}
