use crate::config::Source;
use crate::engine::cache::LayerCache;
use crate::engine::fitter::ExtentFitter;
use crate::engine::overlay::{ToggleOutcome, VectorOverlaySet};
use crate::engine::raster::{ActivationOutcome, RasterLayerController};
use crate::error::LayerError;
use crate::models::{
    layer::Layer,
    resource::{LayerRole, ResourceSpec},
};
use crate::reader::catalog::Catalog;
use crate::traits::{ResourceProbe, SourceFactory, StatusSink, Viewport};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators shared by both controllers.
pub struct LayerContext {
    pub catalog: Catalog,
    pub source: Source,
    pub cache: LayerCache,
    pub viewport: Arc<dyn Viewport>,
    pub status: Arc<dyn StatusSink>,
    pub probe: Arc<dyn ResourceProbe>,
    pub sources: Arc<dyn SourceFactory>,
    pub fitter: ExtentFitter,
}

impl LayerContext {
    /// Catalog entry for `key`, checked against the role the caller expects.
    pub fn spec(&self, key: &str, role: LayerRole) -> Result<&ResourceSpec, LayerError> {
        let spec = self
            .catalog
            .get(key)
            .ok_or_else(|| LayerError::UnknownLayer(key.to_string()))?;
        if spec.role != role {
            return Err(LayerError::WrongRole {
                key: key.to_string(),
                expected: role,
            });
        }
        Ok(spec)
    }

    pub fn locator(&self, spec: &ResourceSpec) -> String {
        self.source.locate(&spec.path)
    }

    /// Builds the layer object. Loading continues behind the source state.
    pub fn build(&self, spec: &ResourceSpec) -> Result<Layer, LayerError> {
        let source = self.sources.build(spec, &self.locator(spec))?;
        Ok(Layer::from_spec(spec, source))
    }

    /// Label for status messages, falling back to the key for unknown layers.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.catalog.get(key).map(|s| s.label.as_str()).unwrap_or(key)
    }
}

/// Everything one viewer session owns. Build a fresh one per test.
pub struct Session {
    ctx: Arc<LayerContext>,
    base: RasterLayerController,
    overlays: VectorOverlaySet,
}

impl Session {
    pub fn new(
        catalog: Catalog,
        source: Source,
        viewport: Arc<dyn Viewport>,
        status: Arc<dyn StatusSink>,
        probe: Arc<dyn ResourceProbe>,
        sources: Arc<dyn SourceFactory>,
        poll_interval: Duration,
    ) -> Self {
        let ctx = Arc::new(LayerContext {
            catalog,
            source,
            cache: LayerCache::new(),
            fitter: ExtentFitter::new(viewport.clone(), poll_interval),
            viewport,
            status,
            probe,
            sources,
        });
        Session {
            base: RasterLayerController::new(ctx.clone()),
            overlays: VectorOverlaySet::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn activate_base(&self, key: &str) -> ActivationOutcome {
        self.base.activate_base(key).await
    }

    pub async fn toggle_overlay(&self, key: &str) -> ToggleOutcome {
        self.overlays.toggle(key).await
    }

    pub fn clear_overlays(&self) -> usize {
        self.overlays.clear_all()
    }

    pub fn base(&self) -> &RasterLayerController {
        &self.base
    }

    pub fn overlays(&self) -> &VectorOverlaySet {
        &self.overlays
    }

    pub fn catalog(&self) -> &Catalog {
        &self.ctx.catalog
    }

    pub fn cache(&self) -> &LayerCache {
        &self.ctx.cache
    }
}
