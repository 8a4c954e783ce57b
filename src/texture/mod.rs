//! Texture rasterization and sampling.
//!
//! The badge design is drawn once per export into an RGBA buffer. That buffer
//! is the material texture written next to the OBJ, the source of the
//! [`EdgeMap`] that drives adaptive subdivision, and the color source for
//! vertex-colored (3D print) output.
//!
//! Drawing order:
//!
//! 1. background color inside the rounded badge outline (transparent outside)
//! 2. the photo, cover-fitted into its rectangle, at its opacity
//! 3. text runs, each line centred horizontally on the run's `x`
//! 4. the hole, cut back to transparent
//! 5. a small patch of background color at UV `(0, 0)`, which single-sided
//!    back faces sample
//!
//! The texture's longer side has `texture_resolution` pixels; the shorter side
//! follows the badge's aspect ratio.

pub mod edges;

use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use nalgebra::Point2;
use rusttype::{point, Font, Scale};

use crate::config::{BadgeDesign, Color, ImageSettings, TextRun};
use crate::contour;
use crate::error::{BadgeError, Result};
use crate::geometry;

pub use edges::EdgeMap;

/// Side length in pixels of the blank patch at UV `(0, 0)`.
pub const BLANK_PATCH: u32 = 2;

/// Font data registered by family name.
///
/// The first registered font doubles as the fallback for unknown families.
#[derive(Default)]
pub struct FontBook {
    fonts: Vec<(String, Font<'static>)>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.families())
            .finish()
    }
}

impl FontBook {
    /// An empty book; text is skipped until a font is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register TrueType/OpenType data under `family`.
    pub fn add<S: Into<String>>(&mut self, family: S, data: Vec<u8>) -> Result<()> {
        let family = family.into();
        let font = Font::try_from_vec(data).ok_or_else(|| BadgeError::FontLoad {
            family: family.clone(),
            message: "not a TrueType or OpenType font".to_string(),
        })?;
        self.fonts.push((family, font));
        Ok(())
    }

    /// Read a font file and register it under `family`.
    pub fn load<S: Into<String>, P: AsRef<Path>>(&mut self, family: S, path: P) -> Result<()> {
        let data = std::fs::read(path)?;
        self.add(family, data)
    }

    /// Whether no font is registered.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Registered family names, in registration order.
    pub fn families(&self) -> Vec<&str> {
        self.fonts.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The font for `family` (case-insensitive), or the fallback.
    pub fn get(&self, family: &str) -> Option<&Font<'static>> {
        self.fonts
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(family))
            .or_else(|| self.fonts.first())
            .map(|(_, font)| font)
    }

    fn has_family(&self, family: &str) -> bool {
        self.fonts.iter().any(|(name, _)| name.eq_ignore_ascii_case(family))
    }
}

/// Pixel dimensions of the texture for a badge.
pub fn texture_size(width_mm: f64, height_mm: f64, resolution: u32) -> (u32, u32) {
    let longer = width_mm.max(height_mm);
    let scale = resolution as f64 / longer;
    let w = ((width_mm * scale).round() as u32).max(BLANK_PATCH);
    let h = ((height_mm * scale).round() as u32).max(BLANK_PATCH);
    (w, h)
}

/// Decode an image given as a file path or a `data:<mime>;base64,<payload>` URL.
pub fn load_image_source(src: &str) -> Result<DynamicImage> {
    if let Some(rest) = src.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| BadgeError::image_decode("data URL", "missing ',' separator"))?;
        if !header.ends_with(";base64") {
            return Err(BadgeError::image_decode(
                "data URL",
                "only base64 data URLs are supported",
            ));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| BadgeError::image_decode("data URL", e))?;
        return image::load_from_memory(&bytes).map_err(|e| BadgeError::image_decode("data URL", e));
    }

    image::open(src).map_err(|e| BadgeError::image_decode(src, e))
}

/// A rasterized badge texture.
#[derive(Debug)]
pub struct Texture {
    image: RgbaImage,
    background: Color,
    edges: OnceLock<EdgeMap>,
}

impl Texture {
    /// Wrap an RGBA buffer; `background` is what transparent pixels read as.
    pub fn from_image(image: RgbaImage, background: Color) -> Self {
        Self {
            image,
            background,
            edges: OnceLock::new(),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The pixel buffer.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Color at a UV coordinate, composited over the background.
    pub fn sample_rgb(&self, u: f64, v: f64) -> [f32; 3] {
        let (w, h) = (self.width(), self.height());
        let x = ((u.clamp(0.0, 1.0) * w as f64) as u32).min(w - 1);
        let y = (((1.0 - v.clamp(0.0, 1.0)) * h as f64) as u32).min(h - 1);

        let [r, g, b, a] = self.image.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let bg = self.background.to_unit_rgb();
        [
            r as f32 / 255.0 * alpha + bg[0] * (1.0 - alpha),
            g as f32 / 255.0 * alpha + bg[1] * (1.0 - alpha),
            b as f32 / 255.0 * alpha + bg[2] * (1.0 - alpha),
        ]
    }

    /// Edge map of this texture, computed on first use.
    pub fn edge_map(&self, parallel: bool) -> &EdgeMap {
        self.edges
            .get_or_init(|| EdgeMap::from_image(&self.image, self.background, parallel))
    }

    /// Encode the texture as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        PngEncoder::new(&mut buf)
            .write_image(
                self.image.as_raw(),
                self.width(),
                self.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BadgeError::TextureEncode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// Maps texture pixels to editor and badge coordinates.
#[derive(Debug, Clone, Copy)]
struct PixelFrame {
    width_mm: f64,
    height_mm: f64,
    /// Pixels per mm along x.
    sx: f64,
    /// Pixels per mm along y.
    sy: f64,
}

impl PixelFrame {
    /// Badge-space (centred, y up) position of a pixel centre.
    fn badge_point(&self, px: u32, py: u32) -> Point2<f64> {
        let ex = (px as f64 + 0.5) / self.sx;
        let ey = (py as f64 + 0.5) / self.sy;
        Point2::new(ex - self.width_mm / 2.0, self.height_mm / 2.0 - ey)
    }
}

/// Draw a design into a texture.
pub fn rasterize(design: &BadgeDesign, fonts: &FontBook, resolution: u32) -> Result<Texture> {
    let badge = &design.badge;
    let (w, h) = texture_size(badge.width, badge.height, resolution);
    let frame = PixelFrame {
        width_mm: badge.width,
        height_mm: badge.height,
        sx: w as f64 / badge.width,
        sy: h as f64 / badge.height,
    };

    let mut image = RgbaImage::new(w, h);
    fill_background(&mut image, design, &frame);

    if let Some(settings) = &design.image {
        let photo = load_image_source(&settings.src)?;
        draw_photo(&mut image, &photo.to_rgba8(), settings, &frame);
    }

    draw_texts(&mut image, &design.texts, fonts, &frame);
    cut_hole(&mut image, design, &frame);
    paint_blank_patch(&mut image, badge.background_color);

    log::debug!("rasterized {}x{} texture", w, h);
    Ok(Texture::from_image(image, badge.background_color))
}

fn fill_background(image: &mut RgbaImage, design: &BadgeDesign, frame: &PixelFrame) {
    let badge = &design.badge;
    let fill = Rgba(badge.background_color.to_rgba());
    let center = Point2::origin();
    let radius = badge.clamped_radius();

    for (px, py, pixel) in image.enumerate_pixels_mut() {
        let p = frame.badge_point(px, py);
        let d = geometry::rounded_rect_distance(&p, &center, badge.width / 2.0, badge.height / 2.0, radius);
        *pixel = if d <= 0.0 { fill } else { Rgba([0, 0, 0, 0]) };
    }
}

/// Blend `rgb` over an opaque-ish badge pixel; pixels outside the badge stay clear.
#[inline]
fn blend(pixel: &mut Rgba<u8>, rgb: [u8; 3], alpha: f32) {
    if pixel.0[3] == 0 || alpha <= 0.0 {
        return;
    }
    let alpha = alpha.min(1.0);
    for c in 0..3 {
        let mixed = rgb[c] as f32 * alpha + pixel.0[c] as f32 * (1.0 - alpha);
        pixel.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

/// Cover-fit `photo` into the image rectangle: scaled to fill it, centred, cropped.
fn draw_photo(image: &mut RgbaImage, photo: &RgbaImage, settings: &ImageSettings, frame: &PixelFrame) {
    let (iw, ih) = (photo.width() as f64, photo.height() as f64);
    let x0 = settings.x * frame.sx;
    let y0 = settings.y * frame.sy;
    let rw = settings.width * frame.sx;
    let rh = settings.height * frame.sy;
    if rw <= 0.0 || rh <= 0.0 || iw == 0.0 || ih == 0.0 {
        return;
    }

    let s = (rw / iw).max(rh / ih);
    let off_x = (rw - iw * s) / 2.0;
    let off_y = (rh - ih * s) / 2.0;

    let (w, h) = (image.width() as f64, image.height() as f64);
    let px_start = x0.floor().max(0.0) as u32;
    let px_end = (x0 + rw).ceil().min(w) as u32;
    let py_start = y0.floor().max(0.0) as u32;
    let py_end = (y0 + rh).ceil().min(h) as u32;

    for py in py_start..py_end {
        let cy = py as f64 + 0.5;
        if cy < y0 || cy >= y0 + rh {
            continue;
        }
        let sy = (((cy - y0 - off_y) / s).floor().max(0.0) as u32).min(photo.height() - 1);
        for px in px_start..px_end {
            let cx = px as f64 + 0.5;
            if cx < x0 || cx >= x0 + rw {
                continue;
            }
            let sx = (((cx - x0 - off_x) / s).floor().max(0.0) as u32).min(photo.width() - 1);
            let [r, g, b, a] = photo.get_pixel(sx, sy).0;
            let alpha = a as f32 / 255.0 * settings.opacity as f32;
            blend(image.get_pixel_mut(px, py), [r, g, b], alpha);
        }
    }
}

fn draw_texts(image: &mut RgbaImage, texts: &[TextRun], fonts: &FontBook, frame: &PixelFrame) {
    let drawable: Vec<&TextRun> = texts.iter().filter(|t| !t.content.trim().is_empty()).collect();
    if drawable.is_empty() {
        return;
    }
    if fonts.is_empty() {
        log::warn!("no fonts registered; skipping {} text run(s)", drawable.len());
        return;
    }

    for run in drawable {
        if !run.font_family.is_empty() && !fonts.has_family(&run.font_family) {
            log::warn!("font family {:?} not registered; using fallback", run.font_family);
        }
        if let Some(font) = fonts.get(&run.font_family) {
            draw_text_run(image, run, font, frame);
        }
    }
}

/// Draw one run: lines stacked `line_height * font_size` apart, the block
/// centred on `(x, y)`, each line centred horizontally.
fn draw_text_run(image: &mut RgbaImage, run: &TextRun, font: &Font<'static>, frame: &PixelFrame) {
    let size_px = (run.font_size * frame.sy) as f32;
    if size_px <= 0.0 {
        return;
    }
    let scale = Scale::uniform(size_px);
    let metrics = font.v_metrics(scale);
    let advance = (run.font_size * run.line_height * frame.sy) as f32;

    let lines: Vec<&str> = run.content.split('\n').collect();
    let center_x = (run.x * frame.sx) as f32;
    let center_y = (run.y * frame.sy) as f32;
    let top = center_y - advance * lines.len() as f32 / 2.0;

    let [r, g, b, a] = run.color.to_rgba();
    let color_alpha = a as f32 / 255.0;
    let (w, h) = (image.width() as i32, image.height() as i32);

    for (k, line) in lines.iter().enumerate() {
        let line_mid = top + advance * (k as f32 + 0.5);
        let baseline = line_mid + (metrics.ascent + metrics.descent) / 2.0;

        let line_width = font
            .layout(line, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        let start = point(center_x - line_width / 2.0, baseline);

        for glyph in font.layout(line, scale, start) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = bb.min.x + gx as i32;
                let y = bb.min.y + gy as i32;
                if x < 0 || y < 0 || x >= w || y >= h {
                    return;
                }
                blend(image.get_pixel_mut(x as u32, y as u32), [r, g, b], coverage * color_alpha);
            });
        }
    }
}

fn cut_hole(image: &mut RgbaImage, design: &BadgeDesign, frame: &PixelFrame) {
    let Some(hole) = contour::hole_params(&design.hole, &design.badge) else {
        return;
    };
    for (px, py, pixel) in image.enumerate_pixels_mut() {
        if hole.contains(&frame.badge_point(px, py)) {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

/// Background-colored patch around UV `(0, 0)`, the bottom-left pixels.
fn paint_blank_patch(image: &mut RgbaImage, background: Color) {
    let [r, g, b, _] = background.to_rgba();
    let (w, h) = (image.width(), image.height());
    for y in h.saturating_sub(BLANK_PATCH)..h {
        for x in 0..BLANK_PATCH.min(w) {
            image.put_pixel(x, y, Rgba([r, g, b, 255]));
        }
    }
}
