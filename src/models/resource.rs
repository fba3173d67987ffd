use serde::Serialize;
use std::fmt;

/// Whether a resource competes for the single base slot or is an independent overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    Base,
    Overlay,
}

/// File format of the resource; decides which source gets built and how its extent is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    GeoTiff,
    GeoJson,
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerRole::Base => write!(f, "base"),
            LayerRole::Overlay => write!(f, "overlay"),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::GeoTiff => write!(f, "geotiff"),
            ResourceKind::GeoJson => write!(f, "geojson"),
        }
    }
}

/// Construction options handed to the source. `min`/`max` clamp the display
/// range explicitly, otherwise `normalize` derives it from the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOptions {
    pub bands: Vec<usize>,
    pub normalize: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Lets the tile grid extent run past the antimeridian instead of
    /// stopping at the world edge.
    pub wrap_x: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        SourceOptions {
            bands: vec![1, 2, 3],
            normalize: true,
            min: None,
            max: None,
            wrap_x: true,
        }
    }
}

/// RGBA colour, parsed from CSS notation.
pub type Rgba = [u8; 4];

pub fn parse_colour(text: &str) -> Result<Rgba, String> {
    text.trim()
        .parse::<colorgrad::Color>()
        .map(|c| c.to_rgba8())
        .map_err(|e| format!("Invalid colour '{}': {}", text, e))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorStyle {
    pub stroke: Option<Rgba>,
    pub stroke_width: f32,
    pub fill: Option<Rgba>,
    /// Set for point layers, drawn as circles.
    pub point_radius: Option<f32>,
}

impl VectorStyle {
    pub fn stroke(stroke: &str, width: f32) -> Result<Self, String> {
        Ok(VectorStyle {
            stroke: Some(parse_colour(stroke)?),
            stroke_width: width,
            fill: None,
            point_radius: None,
        })
    }

    pub fn with_fill(mut self, fill: &str) -> Result<Self, String> {
        self.fill = Some(parse_colour(fill)?);
        Ok(self)
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.point_radius = Some(radius);
        self
    }
}

/// Everything needed to build one layer: where it lives, how it is shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSpec {
    pub key: String,
    pub role: LayerRole,
    pub kind: ResourceKind,
    /// Path relative to the configured data source.
    pub path: String,
    /// Display name, shown in the status line once the layer is active.
    pub label: String,
    pub opacity: f32,
    pub options: SourceOptions,
    pub style: Option<VectorStyle>,
    /// Overlay only: fit the viewport to the features once, after first load.
    pub fit_on_load: bool,
}

impl ResourceSpec {
    pub fn raster(key: &str, path: &str, opacity: f32) -> Self {
        ResourceSpec {
            key: key.to_string(),
            role: LayerRole::Base,
            kind: ResourceKind::GeoTiff,
            path: path.to_string(),
            label: path.to_string(),
            opacity,
            options: SourceOptions::default(),
            style: None,
            fit_on_load: false,
        }
    }

    pub fn vector(key: &str, role: LayerRole, path: &str, style: VectorStyle) -> Self {
        ResourceSpec {
            key: key.to_string(),
            role,
            kind: ResourceKind::GeoJson,
            path: path.to_string(),
            label: path.to_string(),
            opacity: 1.0,
            options: SourceOptions {
                bands: Vec::new(),
                normalize: false,
                min: None,
                max: None,
                wrap_x: true,
            },
            style: Some(style),
            fit_on_load: false,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}
