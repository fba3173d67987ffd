use crate::models::{extent::Extent, resource::ResourceKind};
use crate::traits::{FitOptions, SourceState, SpatialSource, Viewport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Delay between two samples of a source that is not ready yet.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub const RASTER_FIT: FitOptions = FitOptions {
    padding: [50.0, 50.0, 50.0, 50.0],
    max_zoom: 18.0,
    duration_ms: 1500,
};

pub const VECTOR_FIT: FitOptions = FitOptions {
    padding: [50.0, 50.0, 50.0, 50.0],
    max_zoom: 15.0,
    duration_ms: 1000,
};

/// Where an extent is read from once the source is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentStrategy {
    /// View configuration first, then the tile grid.
    Raster,
    /// Bounds of the loaded features.
    Features,
}

impl ExtentStrategy {
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::GeoTiff => ExtentStrategy::Raster,
            ResourceKind::GeoJson => ExtentStrategy::Features,
        }
    }

    pub fn fit_options(&self) -> FitOptions {
        match self {
            ExtentStrategy::Raster => RASTER_FIT,
            ExtentStrategy::Features => VECTOR_FIT,
        }
    }

    /// First candidate with all four components finite.
    pub fn resolve(&self, source: &dyn SpatialSource) -> Option<Extent> {
        match self {
            ExtentStrategy::Raster => [source.view_extent(), source.tile_grid_extent()]
                .into_iter()
                .flatten()
                .find(Extent::is_valid),
            ExtentStrategy::Features => source.feature_extent().filter(Extent::is_valid),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    /// The viewport was asked to fit this extent.
    Fitted(Extent),
    /// The source reached its error state.
    Failed,
    /// The token was cancelled before a fit was issued.
    Cancelled,
}

impl FitOutcome {
    pub fn is_fitted(&self) -> bool {
        matches!(self, FitOutcome::Fitted(_))
    }
}

/// Polls a source until it settles and frames the viewport on its extent.
///
/// Retries are unbounded; callers that need a deadline cancel the token.
#[derive(Clone)]
pub struct ExtentFitter {
    viewport: Arc<dyn Viewport>,
    poll_interval: Duration,
}

impl ExtentFitter {
    pub fn new(viewport: Arc<dyn Viewport>, poll_interval: Duration) -> Self {
        ExtentFitter {
            viewport,
            poll_interval,
        }
    }

    /// Raster fit that cannot be cancelled. Resolves `true` once the viewport
    /// has been fitted, `false` if the source failed.
    pub async fn fit_to_source(&self, source: &dyn SpatialSource, label: &str) -> bool {
        self.fit(source, label, ExtentStrategy::Raster, &CancellationToken::new())
            .await
            .is_fitted()
    }

    pub async fn fit(
        &self,
        source: &dyn SpatialSource,
        label: &str,
        strategy: ExtentStrategy,
        cancel: &CancellationToken,
    ) -> FitOutcome {
        let mut attempts: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(layer = label, attempts, "fit cancelled");
                return FitOutcome::Cancelled;
            }

            match source.state() {
                SourceState::Ready => match strategy.resolve(source) {
                    Some(extent) => {
                        let options = strategy.fit_options();
                        self.viewport.fit_to_extent(extent, options);
                        info!(layer = label, extent = ?extent.as_array(), "viewport fitted");
                        return FitOutcome::Fitted(extent);
                    }
                    None if attempts == 0 => {
                        warn!(layer = label, "extent missing or invalid, retrying")
                    }
                    None => debug!(layer = label, attempts, "extent still unavailable"),
                },
                SourceState::Error => {
                    error!(layer = label, "source failed to load");
                    return FitOutcome::Failed;
                }
                SourceState::Pending => trace!(layer = label, attempts, "source pending"),
            }

            attempts += 1;
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(layer = label, attempts, "fit cancelled while waiting");
                    return FitOutcome::Cancelled;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Runs [`fit`](Self::fit) on its own task. Dropping the handle detaches it.
    pub fn spawn(
        &self,
        source: Arc<dyn SpatialSource>,
        label: String,
        strategy: ExtentStrategy,
        cancel: CancellationToken,
    ) -> JoinHandle<FitOutcome> {
        let fitter = self.clone();
        tokio::spawn(async move { fitter.fit(source.as_ref(), &label, strategy, &cancel).await })
    }
}
