use crate::error::LayerError;
use crate::models::{extent::Extent, layer::Layer, resource::ResourceSpec};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Readiness of a spatial source. `Ready` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Pending,
    Ready,
    Error,
}

/// Remote raster or vector data with an asynchronous readiness state.
///
/// Extent accessors return what the source currently knows; metadata may lag
/// behind `Ready`, so `None` or a non-finite extent means "not yet".
pub trait SpatialSource: Send + Sync + fmt::Debug {
    fn state(&self) -> SourceState;

    /// Extent advertised by the source's view configuration.
    fn view_extent(&self) -> Option<Extent> {
        None
    }

    /// Extent of the tile grid the source serves.
    fn tile_grid_extent(&self) -> Option<Extent> {
        None
    }

    /// Bounds of all loaded features (vector sources).
    fn feature_extent(&self) -> Option<Extent> {
        None
    }
}

/// Parameters of an animated fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitOptions {
    /// Top, right, bottom, left, in pixels.
    pub padding: [f64; 4],
    pub max_zoom: f64,
    pub duration_ms: u64,
}

/// The rendering surface. Implementations must not block: `fit_to_extent`
/// starts an animation and returns.
pub trait Viewport: Send + Sync {
    fn attach(&self, layer: Arc<Layer>);
    fn detach(&self, layer: &Layer);
    fn fit_to_extent(&self, extent: Extent, options: FitOptions);
}

/// Existence check run before a layer is constructed.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn probe(&self, locator: &str) -> Result<(), LayerError>;
}

/// Builds the spatial source for a resource. Construction must return
/// promptly; loading happens behind the source's state machine.
pub trait SourceFactory: Send + Sync {
    fn build(
        &self,
        spec: &ResourceSpec,
        locator: &str,
    ) -> Result<Arc<dyn SpatialSource>, LayerError>;
}

/// Informational side channel. Last write wins, nothing reads it back for control flow.
pub trait StatusSink: Send + Sync {
    fn update(&self, text: &str);
    /// Marks `key` as the active base layer, clearing any previous marker.
    fn mark_base(&self, key: &str);
    fn mark_overlay(&self, key: &str, active: bool);
}
