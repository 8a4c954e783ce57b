//! Design inputs and export configuration.
//!
//! These types mirror the JSON produced by the badge editor: field names are
//! camelCase and lengths are millimetres. Editor coordinates have their
//! origin at the badge's top-left corner with y growing downward; the mesh
//! pipeline converts them to badge-centred, y-up coordinates.
//!
//! # Example
//!
//! ```
//! use badge_mesh::config::{BadgeDesign, ExportConfig, SubdivisionConfig};
//!
//! let design: BadgeDesign = serde_json::from_str(r#"{
//!     "badge": { "width": 63.0, "height": 90.0, "borderRadius": 3.0 },
//!     "hole": { "enabled": true, "shape": "circle", "size": 6.0, "offsetY": 1.0 }
//! }"#).unwrap();
//! assert!(design.hole.enabled);
//!
//! let config = ExportConfig::default()
//!     .with_thickness(1.5)
//!     .with_density(30)
//!     .with_subdivision(SubdivisionConfig::new(0.25, 2));
//! assert!(config.subdivision_settings().is_some());
//! ```

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::contour;
use crate::error::{BadgeError, Result};
use crate::geometry;

/// An RGBA color, serialized as a `#rrggbb` / `#rrggbbaa` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Opaque black.
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Color> {
        let digits = hex.trim().trim_start_matches('#');
        let nibble = |i: usize| u8::from_str_radix(digits.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();

        match digits.len() {
            3 => Some(Color::rgb(
                nibble(0)? * 17,
                nibble(1)? * 17,
                nibble(2)? * 17,
            )),
            6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }

    /// Channels as `[r, g, b, a]`.
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Color channels normalised to `[0, 1]`, alpha dropped.
    pub fn to_unit_rgb(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color {value:?}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> String {
        color.to_string()
    }
}

fn default_background() -> Color {
    Color::WHITE
}

fn default_text_color() -> Color {
    Color::BLACK
}

fn default_opacity() -> f64 {
    1.0
}

fn default_line_height() -> f64 {
    1.2
}

fn default_true() -> bool {
    true
}

/// Outer badge rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeSettings {
    /// Width in mm.
    pub width: f64,
    /// Height in mm.
    pub height: f64,
    /// Corner radius in mm; clamped to the half-extents.
    #[serde(default)]
    pub border_radius: f64,
    /// Fill color of the printable face.
    #[serde(default = "default_background")]
    pub background_color: Color,
}

impl BadgeSettings {
    /// A badge with square corners and a white background.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            border_radius: 0.0,
            background_color: Color::WHITE,
        }
    }

    /// Set the corner radius.
    pub fn with_border_radius(mut self, radius: f64) -> Self {
        self.border_radius = radius;
        self
    }

    /// Corner radius after clamping to what the rectangle allows.
    pub fn clamped_radius(&self) -> f64 {
        self.border_radius
            .max(0.0)
            .min(self.width.min(self.height) / 2.0)
    }
}

/// Shape of the lanyard hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoleShape {
    /// Circle of diameter `size`.
    #[default]
    Circle,
    /// Ellipse of `width` x `height`.
    Oval,
    /// Rounded rectangle of `width` x `height` with `borderRadius`.
    Rectangle,
}

/// Lanyard hole cut through the badge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoleSettings {
    /// Whether the hole is cut at all.
    #[serde(default)]
    pub enabled: bool,
    /// Hole outline.
    #[serde(default)]
    pub shape: HoleShape,
    /// Diameter for circular holes.
    #[serde(default)]
    pub size: f64,
    /// Width for oval and rectangular holes.
    #[serde(default)]
    pub width: f64,
    /// Height for oval and rectangular holes.
    #[serde(default)]
    pub height: f64,
    /// Distance from the badge's top edge to the top of the hole.
    #[serde(default)]
    pub offset_y: f64,
    /// Corner radius for rectangular holes.
    #[serde(default)]
    pub border_radius: f64,
}

impl HoleSettings {
    /// An enabled circular hole.
    pub fn circle(size: f64, offset_y: f64) -> Self {
        Self {
            enabled: true,
            shape: HoleShape::Circle,
            size,
            offset_y,
            ..Self::default()
        }
    }

    /// An enabled oval hole.
    pub fn oval(width: f64, height: f64, offset_y: f64) -> Self {
        Self {
            enabled: true,
            shape: HoleShape::Oval,
            width,
            height,
            offset_y,
            ..Self::default()
        }
    }

    /// An enabled rounded-rectangle hole (slot).
    pub fn rectangle(width: f64, height: f64, border_radius: f64, offset_y: f64) -> Self {
        Self {
            enabled: true,
            shape: HoleShape::Rectangle,
            width,
            height,
            border_radius,
            offset_y,
            ..Self::default()
        }
    }

    /// Bounding width and height of the hole outline.
    pub fn extent(&self) -> (f64, f64) {
        match self.shape {
            HoleShape::Circle => (self.size, self.size),
            HoleShape::Oval | HoleShape::Rectangle => (self.width, self.height),
        }
    }
}

/// Photo placed on the badge, cover-fitted into its rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    /// File path or `data:<mime>;base64,<payload>` URL.
    pub src: String,
    /// Left edge, mm from the badge's left edge.
    pub x: f64,
    /// Top edge, mm from the badge's top edge.
    pub y: f64,
    /// Width in mm.
    pub width: f64,
    /// Height in mm.
    pub height: f64,
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

/// A block of (possibly multi-line) centred text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    /// Text; `\n` separates lines.
    pub content: String,
    /// Em size in mm.
    pub font_size: f64,
    /// Fill color.
    #[serde(default = "default_text_color")]
    pub color: Color,
    /// Font family registered in the [`FontBook`](crate::texture::FontBook).
    #[serde(default)]
    pub font_family: String,
    /// Horizontal centre of the block, mm from the badge's left edge.
    pub x: f64,
    /// Vertical centre of the block, mm from the badge's top edge.
    pub y: f64,
    /// Line advance as a multiple of `font_size`.
    #[serde(default = "default_line_height")]
    pub line_height: f64,
}

impl TextRun {
    /// A single run with default color, family and line height.
    pub fn new<S: Into<String>>(content: S, font_size: f64, x: f64, y: f64) -> Self {
        Self {
            content: content.into(),
            font_size,
            color: Color::BLACK,
            font_family: String::new(),
            x,
            y,
            line_height: default_line_height(),
        }
    }
}

/// Everything drawn on and cut out of the badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDesign {
    /// Outer badge rectangle.
    pub badge: BadgeSettings,
    /// Optional lanyard hole.
    #[serde(default)]
    pub hole: HoleSettings,
    /// Optional photo.
    #[serde(default)]
    pub image: Option<ImageSettings>,
    /// Text runs, drawn in order.
    #[serde(default)]
    pub texts: Vec<TextRun>,
}

impl BadgeDesign {
    /// A plain badge without hole, image or text.
    pub fn new(badge: BadgeSettings) -> Self {
        Self {
            badge,
            hole: HoleSettings::default(),
            image: None,
            texts: Vec::new(),
        }
    }

    /// Set the hole.
    pub fn with_hole(mut self, hole: HoleSettings) -> Self {
        self.hole = hole;
        self
    }

    /// Append a text run.
    pub fn with_text(mut self, text: TextRun) -> Self {
        self.texts.push(text);
        self
    }

    /// Set the photo.
    pub fn with_image(mut self, image: ImageSettings) -> Self {
        self.image = Some(image);
        self
    }

    /// Check the values the pipeline cannot work around.
    pub fn validate(&self) -> Result<()> {
        let badge = &self.badge;
        if !(badge.width > 0.0 && badge.width.is_finite()) {
            return Err(BadgeError::invalid_param("badge.width", badge.width, "must be positive"));
        }
        if !(badge.height > 0.0 && badge.height.is_finite()) {
            return Err(BadgeError::invalid_param("badge.height", badge.height, "must be positive"));
        }
        self.validate_hole()?;
        if let Some(image) = &self.image {
            if !(0.0..=1.0).contains(&image.opacity) {
                return Err(BadgeError::invalid_param(
                    "image.opacity",
                    image.opacity,
                    "must be within [0, 1]",
                ));
            }
        }
        Ok(())
    }

    /// An enabled hole must lie strictly inside the silhouette, clear of its
    /// edges and rounded corners.
    fn validate_hole(&self) -> Result<()> {
        let (hole, badge) = (&self.hole, &self.badge);
        if contour::hole_params(hole, badge).is_none() {
            return Ok(());
        }
        let (width, height) = hole.extent();
        if hole.offset_y <= 0.0 || hole.offset_y + height >= badge.height {
            return Err(BadgeError::invalid_param(
                "hole.offsetY",
                hole.offset_y,
                "hole must lie inside the badge",
            ));
        }
        if width >= badge.width {
            let name = match hole.shape {
                HoleShape::Circle => "hole.size",
                HoleShape::Oval | HoleShape::Rectangle => "hole.width",
            };
            return Err(BadgeError::invalid_param(name, width, "hole must be narrower than the badge"));
        }

        let silhouette = contour::outline_points(&contour::badge_outline(badge), Point2::origin(), 1);
        let outline = contour::outline_points(
            &contour::hole_outline(hole),
            contour::hole_center(hole, badge),
            HOLE_CHECK_DENSITY,
        );
        let clear = outline.iter().all(|p| {
            geometry::point_in_polygon(p, &silhouette)
                && geometry::distance_to_polygon(p, &silhouette) > geometry::EPSILON
        });
        if !clear {
            return Err(BadgeError::invalid_param(
                "hole.offsetY",
                hole.offset_y,
                "hole must not touch the badge outline",
            ));
        }
        Ok(())
    }
}

/// Sampling density used to check the hole outline against the silhouette.
const HOLE_CHECK_DENSITY: u32 = 200;

/// Base grid resolution of the front and back faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshDensity {
    /// Grid cells along each badge axis.
    pub density: u32,
}

impl Default for MeshDensity {
    fn default() -> Self {
        Self { density: 40 }
    }
}

/// Texture-driven adaptive subdivision settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdivisionConfig {
    /// Whether adaptive subdivision runs.
    #[serde(default)]
    pub enabled: bool,
    /// Base score threshold; lower values subdivide more.
    #[serde(default = "SubdivisionConfig::default_threshold")]
    pub threshold: f64,
    /// Maximum recursion depth.
    #[serde(default = "SubdivisionConfig::default_max_depth")]
    pub max_depth: u32,
}

impl SubdivisionConfig {
    /// Enabled subdivision with the given threshold and depth.
    pub fn new(threshold: f64, max_depth: u32) -> Self {
        Self {
            enabled: true,
            threshold,
            max_depth,
        }
    }

    fn default_threshold() -> f64 {
        0.3
    }

    fn default_max_depth() -> u32 {
        3
    }
}

impl Default for SubdivisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: Self::default_threshold(),
            max_depth: Self::default_max_depth(),
        }
    }
}

/// Rendering configuration for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Print the design on both faces (back mirrored) instead of the front only.
    #[serde(default = "default_true")]
    pub double_sided: bool,
    /// Badge thickness in mm.
    #[serde(default = "ExportConfig::default_thickness")]
    pub thickness: f64,
    /// Base grid resolution.
    #[serde(default)]
    pub mesh_density: MeshDensity,
    /// Texture size in pixels along the badge's longer side.
    #[serde(default = "ExportConfig::default_texture_resolution")]
    pub texture_resolution: u32,
    /// Adaptive subdivision; absent means disabled.
    #[serde(default)]
    pub subdivision: Option<SubdivisionConfig>,
    /// Emit a vertex-colored OBJ without UVs or material.
    #[serde(default, rename = "for3DPrinting")]
    pub for_3d_printing: bool,
    /// Use rayon for the read-only data-parallel passes.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl ExportConfig {
    fn default_thickness() -> f64 {
        2.0
    }

    fn default_texture_resolution() -> u32 {
        1024
    }

    /// Set double-sided printing.
    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    /// Set the thickness in mm.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    /// Set the base grid resolution.
    pub fn with_density(mut self, density: u32) -> Self {
        self.mesh_density = MeshDensity { density };
        self
    }

    /// Set the texture size along the longer badge side.
    pub fn with_texture_resolution(mut self, resolution: u32) -> Self {
        self.texture_resolution = resolution;
        self
    }

    /// Set adaptive subdivision.
    pub fn with_subdivision(mut self, subdivision: SubdivisionConfig) -> Self {
        self.subdivision = Some(subdivision);
        self
    }

    /// Select vertex-color (3D print) output.
    pub fn for_printing(mut self, enabled: bool) -> Self {
        self.for_3d_printing = enabled;
        self
    }

    /// Run every pass on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Subdivision settings, if subdivision is enabled.
    pub fn subdivision_settings(&self) -> Option<&SubdivisionConfig> {
        self.subdivision.as_ref().filter(|s| s.enabled)
    }

    /// Check the values the pipeline cannot work around.
    pub fn validate(&self) -> Result<()> {
        if !(self.thickness > 0.0 && self.thickness.is_finite()) {
            return Err(BadgeError::invalid_param("thickness", self.thickness, "must be positive"));
        }
        if self.mesh_density.density == 0 {
            return Err(BadgeError::invalid_param(
                "meshDensity.density",
                self.mesh_density.density,
                "must be at least 1",
            ));
        }
        if self.texture_resolution < 2 {
            return Err(BadgeError::invalid_param(
                "textureResolution",
                self.texture_resolution,
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            double_sided: true,
            thickness: Self::default_thickness(),
            mesh_density: MeshDensity::default(),
            texture_resolution: Self::default_texture_resolution(),
            subdivision: None,
            for_3d_printing: false,
            parallel: true,
        }
    }
}

/// The JSON document accepted by the CLI: a design plus its export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFile {
    /// What to draw and cut.
    #[serde(flatten)]
    pub design: BadgeDesign,
    /// How to export it.
    #[serde(default)]
    pub export: ExportConfig,
}

impl DesignFile {
    /// Parse a design file from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
