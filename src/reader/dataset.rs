use crate::error::LayerError;
use crate::geometry::projection::{covering_tile_bounds, zoom_for_resolution};
use crate::models::{
    extent::Extent,
    layer::LayerGeometry,
    resource::{ResourceKind, ResourceSpec, SourceOptions},
};
use crate::traits::{SourceFactory, SourceState, SpatialSource};
use anyhow::{Context, bail};
use gdal::Dataset;
use gdal::vector::LayerAccess;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// GeoJSON coordinates are always WGS84.
const GEOJSON_CRS: i32 = 4326;

/// Metadata read once the dataset has been opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetadata {
    pub view_extent: Option<Extent>,
    pub tile_grid_extent: Option<Extent>,
    pub feature_extent: Option<Extent>,
    /// Value range mapped onto the display range.
    pub display_range: Option<(f64, f64)>,
    pub band_count: usize,
}

#[derive(Debug)]
enum LoadState {
    Pending,
    Ready(SourceMetadata),
    Error(String),
}

/// Source backed by a GDAL dataset, loaded on a blocking task.
#[derive(Debug, Clone)]
pub struct GdalSource {
    dataset: String,
    state: Arc<Mutex<LoadState>>,
}

impl GdalSource {
    fn pending(dataset: String) -> Self {
        GdalSource {
            dataset,
            state: Arc::new(Mutex::new(LoadState::Pending)),
        }
    }

    fn settle(&self, result: anyhow::Result<SourceMetadata>) {
        let next = match result {
            Ok(meta) => {
                debug!(dataset = %self.dataset, ?meta, "source ready");
                LoadState::Ready(meta)
            }
            Err(err) => {
                warn!(dataset = %self.dataset, "source failed: {:#}", err);
                LoadState::Error(format!("{:#}", err))
            }
        };
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    fn metadata(&self) -> Option<SourceMetadata> {
        match &*self.state.lock().unwrap_or_else(|e| e.into_inner()) {
            LoadState::Ready(meta) => Some(meta.clone()),
            _ => None,
        }
    }

    pub fn display_range(&self) -> Option<(f64, f64)> {
        self.metadata().and_then(|m| m.display_range)
    }

    pub fn error(&self) -> Option<String> {
        match &*self.state.lock().unwrap_or_else(|e| e.into_inner()) {
            LoadState::Error(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

impl SpatialSource for GdalSource {
    fn state(&self) -> SourceState {
        match &*self.state.lock().unwrap_or_else(|e| e.into_inner()) {
            LoadState::Pending => SourceState::Pending,
            LoadState::Ready(_) => SourceState::Ready,
            LoadState::Error(_) => SourceState::Error,
        }
    }

    fn view_extent(&self) -> Option<Extent> {
        self.metadata().and_then(|m| m.view_extent)
    }

    fn tile_grid_extent(&self) -> Option<Extent> {
        self.metadata().and_then(|m| m.tile_grid_extent)
    }

    fn feature_extent(&self) -> Option<Extent> {
        self.metadata().and_then(|m| m.feature_extent)
    }
}

/// GDAL path for a locator; remote files go through `/vsicurl/`.
pub fn dataset_path(locator: &str) -> String {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        format!("/vsicurl/{}", locator)
    } else {
        locator.to_string()
    }
}

/// Builds [`GdalSource`]s, opening each dataset on the blocking pool.
pub struct GdalSourceFactory {
    runtime: Handle,
}

impl GdalSourceFactory {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = Handle::try_current().context("GDAL sources need a tokio runtime")?;
        Ok(GdalSourceFactory { runtime })
    }
}

impl SourceFactory for GdalSourceFactory {
    fn build(
        &self,
        spec: &ResourceSpec,
        locator: &str,
    ) -> Result<Arc<dyn SpatialSource>, LayerError> {
        let path = dataset_path(locator);
        let source = GdalSource::pending(path.clone());
        let loader = source.clone();
        let kind = spec.kind;
        let options = spec.options.clone();

        self.runtime.spawn_blocking(move || {
            let result = match kind {
                ResourceKind::GeoTiff => load_raster(&path, &options),
                ResourceKind::GeoJson => load_vector(&path),
            };
            loader.settle(result);
        });

        Ok(Arc::new(source))
    }
}

pub fn load_raster(path: &str, options: &SourceOptions) -> anyhow::Result<SourceMetadata> {
    let ds = Dataset::open(path).with_context(|| format!("failed to open {}", path))?;

    let band_count = ds.raster_count() as usize;
    for &band in &options.bands {
        if band == 0 || band > band_count {
            bail!("band {} out of range, dataset has {} bands", band, band_count);
        }
    }

    let [x0, px_w, _, y0, _, px_h] = ds.geo_transform()?;
    let (width, height) = ds.raster_size();
    let (x1, y1) = (x0 + px_w * width as f64, y0 + px_h * height as f64);
    let native = Extent::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1));

    let crs_code = ds.spatial_ref()?.auth_code()?;
    let view = LayerGeometry {
        crs_code,
        extent: native,
    }
    .to_viewport()?;

    let native_zoom = zoom_for_resolution(view.width() / width as f64);
    let tile_grid = if native_zoom.is_finite() {
        let z = native_zoom.floor().clamp(0.0, 24.0) as u8;
        Some(Extent::from(covering_tile_bounds(
            z,
            (view.minx, view.miny, view.maxx, view.maxy),
            options.wrap_x,
        )))
    } else {
        None
    };

    let display_range = match (options.min, options.max) {
        (Some(min), Some(max)) => Some((min, max)),
        _ if options.normalize => {
            let band = ds.rasterband(options.bands.first().copied().unwrap_or(1))?;
            let stats = band.compute_raster_min_max(false)?;
            Some((options.min.unwrap_or(stats.min), options.max.unwrap_or(stats.max)))
        }
        _ => None,
    };

    Ok(SourceMetadata {
        view_extent: Some(view),
        tile_grid_extent: tile_grid,
        feature_extent: None,
        display_range,
        band_count,
    })
}

pub fn load_vector(path: &str) -> anyhow::Result<SourceMetadata> {
    let ds = Dataset::open(path).with_context(|| format!("failed to open {}", path))?;

    let mut extent = Extent::empty();
    for layer in ds.layers() {
        if layer.feature_count() == 0 {
            continue;
        }
        let env = layer.get_extent()?;
        extent = extent.union(&Extent::new(env.MinX, env.MinY, env.MaxX, env.MaxY));
    }

    // an empty collection stays ready with no extent
    let feature_extent = if extent.is_valid() {
        Some(
            LayerGeometry {
                crs_code: GEOJSON_CRS,
                extent,
            }
            .to_viewport()?,
        )
    } else {
        None
    };

    Ok(SourceMetadata {
        feature_extent,
        ..SourceMetadata::default()
    })
}
