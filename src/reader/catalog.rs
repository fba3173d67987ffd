use crate::models::resource::{
    LayerRole, ResourceKind, ResourceSpec, SourceOptions, VectorStyle, parse_colour,
};
use anyhow::{Context, bail};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// The set of layers a session can show, in button order.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    resources: Vec<ResourceSpec>,
}

/// One CSV row. Optional columns may be left empty.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    key: String,
    role: String,
    kind: String,
    path: String,
    label: Option<String>,
    opacity: Option<f32>,
    /// Space separated, 1-based
    bands: Option<String>,
    normalize: Option<bool>,
    min: Option<f64>,
    max: Option<f64>,
    wrap_x: Option<bool>,
    stroke: Option<String>,
    stroke_width: Option<f32>,
    fill: Option<String>,
    radius: Option<f32>,
    fit_on_load: Option<bool>,
}

impl CatalogRow {
    fn into_spec(self) -> anyhow::Result<ResourceSpec> {
        let role = match self.role.trim().to_ascii_lowercase().as_str() {
            "base" => LayerRole::Base,
            "overlay" => LayerRole::Overlay,
            other => bail!("unknown role '{}' for '{}'", other, self.key),
        };
        let kind = match self.kind.trim().to_ascii_lowercase().as_str() {
            "geotiff" | "tif" | "tiff" => ResourceKind::GeoTiff,
            "geojson" => ResourceKind::GeoJson,
            other => bail!("unknown kind '{}' for '{}'", other, self.key),
        };
        if kind == ResourceKind::GeoTiff && role == LayerRole::Overlay {
            bail!("'{}': raster resources can only be base layers", self.key);
        }

        let mut spec = match kind {
            ResourceKind::GeoTiff => ResourceSpec::raster(&self.key, &self.path, 0.9),
            ResourceKind::GeoJson => {
                let style = VectorStyle {
                    stroke: self
                        .stroke
                        .as_deref()
                        .map(parse_colour)
                        .transpose()
                        .map_err(anyhow::Error::msg)?,
                    stroke_width: self.stroke_width.unwrap_or(2.0),
                    fill: self
                        .fill
                        .as_deref()
                        .map(parse_colour)
                        .transpose()
                        .map_err(anyhow::Error::msg)?,
                    point_radius: self.radius,
                };
                ResourceSpec::vector(&self.key, role, &self.path, style)
            }
        };

        if let Some(label) = self.label.filter(|l| !l.trim().is_empty()) {
            spec.label = label;
        }
        if let Some(opacity) = self.opacity {
            if !(0.0..=1.0).contains(&opacity) {
                bail!("'{}': opacity {} outside 0..1", self.key, opacity);
            }
            spec.opacity = opacity;
        }
        if let Some(bands) = self.bands {
            spec.options.bands = bands
                .split_whitespace()
                .map(|b| b.parse::<usize>())
                .collect::<Result<_, _>>()
                .with_context(|| format!("'{}': invalid bands '{}'", self.key, bands))?;
        }
        spec.options.normalize = self.normalize.unwrap_or(spec.options.normalize);
        spec.options.min = self.min;
        spec.options.max = self.max;
        spec.options.wrap_x = self.wrap_x.unwrap_or(spec.options.wrap_x);
        spec.fit_on_load = self.fit_on_load.unwrap_or(false);

        if let (Some(min), Some(max)) = (spec.options.min, spec.options.max) {
            if min >= max {
                bail!("'{}': min {} must be below max {}", self.key, min, max);
            }
        }
        Ok(spec)
    }
}

impl Catalog {
    pub fn new(resources: Vec<ResourceSpec>) -> anyhow::Result<Self> {
        let mut seen = HashSet::new();
        for spec in &resources {
            if !seen.insert(spec.key.as_str()) {
                bail!("duplicate layer key '{}'", spec.key);
            }
        }
        Ok(Catalog { resources })
    }

    /// Five base layers and three overlays, as served next to the viewer page.
    pub fn builtin() -> Self {
        let points = VectorStyle {
            stroke: Some([255, 255, 255, 255]),
            stroke_width: 2.0,
            fill: Some([255, 0, 0, 255]),
            point_radius: Some(6.0),
        };
        let lines = VectorStyle {
            stroke: Some([0, 0, 255, 255]),
            stroke_width: 3.0,
            fill: None,
            point_radius: None,
        };
        let polygons = VectorStyle {
            stroke: Some([0, 128, 0, 255]),
            stroke_width: 2.0,
            fill: Some([0, 255, 0, 51]),
            point_radius: None,
        };
        let geojson_base = VectorStyle {
            stroke: Some([0, 0, 255, 255]),
            stroke_width: 2.0,
            fill: Some([0, 0, 255, 26]),
            point_radius: None,
        };

        let mut umbra = ResourceSpec::raster("layer5", "Umbra3.tif", 1.0);
        umbra.options = SourceOptions {
            min: Some(0.0),
            max: Some(255.0),
            wrap_x: false,
            ..SourceOptions::default()
        };

        Catalog {
            resources: vec![
                ResourceSpec::raster("layer1", "my1_rgb_fixed.tif", 0.9),
                ResourceSpec::vector("layer2", LayerRole::Base, "3.geojson", geojson_base),
                ResourceSpec::raster("layer3", "Landsat.tif", 0.9),
                ResourceSpec::raster("layer4", "Sentinal.tif", 0.9),
                umbra,
                ResourceSpec::vector("points", LayerRole::Overlay, "points.geojson", points)
                    .with_label("Points"),
                ResourceSpec::vector("lines", LayerRole::Overlay, "lines.geojson", lines)
                    .with_label("Lines"),
                ResourceSpec::vector("polygons", LayerRole::Overlay, "polygons.geojson", polygons)
                    .with_label("Polygons"),
            ],
        }
    }

    /// Load a catalog from a CSV file with a header row.
    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("failed to open catalog {}", path.display()))?;

        let mut resources = Vec::new();
        for (line, row) in rdr.deserialize::<CatalogRow>().enumerate() {
            let row = row.with_context(|| format!("catalog row {}", line + 1))?;
            resources.push(row.into_spec()?);
        }
        if resources.is_empty() {
            bail!("catalog {} has no layers", path.display());
        }
        Catalog::new(resources)
    }

    pub fn get(&self, key: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.key == key)
    }

    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    pub fn with_role(&self, role: LayerRole) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.iter().filter(move |r| r.role == role)
    }
}
