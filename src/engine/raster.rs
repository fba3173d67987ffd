use crate::engine::fitter::{ExtentStrategy, FitOutcome};
use crate::engine::session::LayerContext;
use crate::error::LayerError;
use crate::models::{layer::Layer, resource::LayerRole};
use crate::traits::{SourceState, StatusSink};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated { key: String, first_load: bool },
    /// A newer activation started before this one could attach its layer.
    Superseded { key: String },
    Failed(LayerError),
}

impl ActivationOutcome {
    pub fn is_activated(&self) -> bool {
        matches!(self, ActivationOutcome::Activated { .. })
    }
}

#[derive(Default)]
struct BaseState {
    active: Option<Arc<Layer>>,
    /// Bumped on every activation; only the latest may attach.
    generation: u64,
    /// Cancels the fit belonging to the latest activation.
    current: CancellationToken,
}

/// Keeps at most one base layer on the viewport.
pub struct RasterLayerController {
    ctx: Arc<LayerContext>,
    state: Arc<Mutex<BaseState>>,
}

fn lock_state(state: &Mutex<BaseState>) -> MutexGuard<'_, BaseState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl RasterLayerController {
    pub fn new(ctx: Arc<LayerContext>) -> Self {
        RasterLayerController {
            ctx,
            state: Arc::new(Mutex::new(BaseState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BaseState> {
        lock_state(&self.state)
    }

    pub fn active(&self) -> Option<Arc<Layer>> {
        self.lock().active.clone()
    }

    pub fn active_key(&self) -> Option<String> {
        self.lock().active.as_ref().map(|l| l.key.clone())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Makes `key` the visible base layer.
    ///
    /// The previous base layer is detached first and is not restored if this
    /// activation fails. Errors are reported to the status sink and returned
    /// as [`ActivationOutcome::Failed`], never propagated.
    pub async fn activate_base(&self, key: &str) -> ActivationOutcome {
        let (generation, cancel) = self.begin();

        match self.try_activate(key, generation, &cancel).await {
            Ok(outcome) => outcome,
            Err(err) if !self.is_current(generation) => {
                warn!(layer = key, "superseded activation failed: {}", err);
                ActivationOutcome::Superseded {
                    key: key.to_string(),
                }
            }
            Err(err) => {
                error!(layer = key, "activation failed: {}", err);
                self.ctx.status.update(&format!(
                    "Failed to load {}: {}",
                    self.ctx.label(key),
                    err
                ));
                ActivationOutcome::Failed(err)
            }
        }
    }

    /// Starts a new activation: detaches the current base layer and cancels
    /// whatever the previous activation was still waiting on.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut state = self.lock();
        state.generation += 1;
        state.current.cancel();
        state.current = CancellationToken::new();
        if let Some(previous) = state.active.take() {
            self.ctx.viewport.detach(&previous);
        }
        (state.generation, state.current.clone())
    }

    /// Attaches `layer` if `generation` is still the latest activation.
    fn commit(&self, generation: u64, layer: &Arc<Layer>) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        self.ctx.viewport.attach(layer.clone());
        state.active = Some(layer.clone());
        true
    }

    /// Fits `layer` in the background. A source that fails while this
    /// activation is still current is reported on the status sink.
    fn spawn_refit(
        &self,
        layer: &Arc<Layer>,
        strategy: ExtentStrategy,
        generation: u64,
        cancel: &CancellationToken,
    ) {
        let fit = self.ctx.fitter.spawn(
            layer.source().clone(),
            layer.label.clone(),
            strategy,
            cancel.child_token(),
        );
        let state = self.state.clone();
        let status: Arc<dyn StatusSink> = self.ctx.status.clone();
        let key = layer.key.clone();
        let label = layer.label.clone();

        tokio::spawn(async move {
            if !matches!(fit.await, Ok(FitOutcome::Failed)) {
                return;
            }
            let state = lock_state(&state);
            if state.generation != generation {
                return;
            }
            let err = LayerError::SourceError { layer: key.clone() };
            error!(layer = %key, "base layer source failed after attach");
            status.update(&format!("Failed to load {}: {}", label, err));
        });
    }

    async fn try_activate(
        &self,
        key: &str,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<ActivationOutcome, LayerError> {
        let ctx = &self.ctx;
        let spec = ctx.spec(key, LayerRole::Base)?;
        let superseded = || ActivationOutcome::Superseded {
            key: key.to_string(),
        };

        let lookup = ctx
            .cache
            .get_or_create(key, || async {
                ctx.status.update(&format!("Loading {}...", spec.label));
                ctx.probe.probe(&ctx.locator(spec)).await?;
                ctx.build(spec)
            })
            .await?;
        let layer = lookup.layer;
        let strategy = ExtentStrategy::for_kind(layer.kind);

        if lookup.fresh && strategy == ExtentStrategy::Raster {
            // frame a freshly loaded raster before it becomes visible
            match ctx
                .fitter
                .fit(layer.source().as_ref(), &layer.label, strategy, cancel)
                .await
            {
                FitOutcome::Fitted(_) => {}
                FitOutcome::Failed => {
                    return Err(LayerError::SourceError {
                        layer: key.to_string(),
                    });
                }
                FitOutcome::Cancelled => return Ok(superseded()),
            }
        } else if layer.state() == SourceState::Error {
            return Err(LayerError::SourceError {
                layer: key.to_string(),
            });
        }

        if !self.commit(generation, &layer) {
            return Ok(superseded());
        }
        info!(layer = key, first_load = lookup.fresh, "base layer active");

        // Re-frame without blocking. A revisit may find the source still
        // pending when its first fit was cancelled by a newer activation.
        if !lookup.fresh || strategy == ExtentStrategy::Features {
            self.spawn_refit(&layer, strategy, generation, cancel);
        }

        ctx.status.mark_base(key);
        ctx.status.update(&layer.label);
        Ok(ActivationOutcome::Activated {
            key: key.to_string(),
            first_load: lookup.fresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fitter::RASTER_FIT;
    use crate::models::extent::Extent;
    use crate::test_support::{ScriptedSource, TestSession, happy_extent};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_fits_and_reports_label() {
        let t = TestSession::new();

        let outcome = t.session.activate_base("layer1").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Activated {
                key: "layer1".into(),
                first_load: true
            }
        );

        let fits = t.viewport.fits();
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].extent, happy_extent());
        assert_eq!(fits[0].options, RASTER_FIT);
        assert_eq!(t.viewport.base_keys(), vec!["layer1"]);
        assert_eq!(t.status.text(), "my1_rgb_fixed.tif");
        assert_eq!(t.status.snapshot().active_base.as_deref(), Some("layer1"));
        assert_eq!(t.session.base().active_key().as_deref(), Some("layer1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_resource_builds_nothing() {
        let t = TestSession::new();
        t.probe.set_missing("data/Landsat.tif", true);

        let outcome = t.session.activate_base("layer3").await;
        assert!(matches!(
            outcome,
            ActivationOutcome::Failed(LayerError::ResourceNotFound { status: 404, .. })
        ));
        assert_eq!(t.factory.builds(), 0);
        assert!(t.viewport.attached_keys().is_empty());
        assert!(t.viewport.fits().is_empty());
        assert!(t.status.text().contains("404"), "status: {}", t.status.text());
        assert!(!t.session.cache().contains("layer3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_construction_is_retried() {
        let t = TestSession::new();
        t.probe.set_missing("data/Landsat.tif", true);
        assert!(!t.session.activate_base("layer3").await.is_activated());

        t.probe.set_missing("data/Landsat.tif", false);
        let outcome = t.session.activate_base("layer3").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Activated {
                key: "layer3".into(),
                first_load: true
            }
        );
        assert_eq!(t.probe.calls_for("data/Landsat.tif"), 2);
        assert_eq!(t.factory.builds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_layer_is_not_probed_or_built_again() {
        let t = TestSession::new();
        t.session.activate_base("layer1").await;
        t.session.activate_base("layer1").await;

        assert_eq!(t.factory.builds(), 1);
        assert_eq!(t.probe.calls_for("data/my1_rgb_fixed.tif"), 1);
        assert_eq!(t.viewport.base_keys(), vec!["layer1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_base_layer_after_each_activation() {
        let t = TestSession::new();
        let keys = ["layer1", "layer2", "layer3", "layer4", "layer5"];
        let mut rng = StdRng::seed_from_u64(7);
        let mut visited = HashSet::new();

        for _ in 0..40 {
            let key = keys[rng.random_range(0..keys.len())];
            visited.insert(key);
            assert!(t.session.activate_base(key).await.is_activated());
            let attached = t.viewport.base_keys();
            assert_eq!(attached, vec![key.to_string()]);
            assert_eq!(t.session.base().active_key().as_deref(), Some(key));
        }
        assert_eq!(t.factory.builds(), visited.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisit_refits_without_blocking() {
        let t = TestSession::new();
        t.session.activate_base("layer1").await;
        t.session.activate_base("layer3").await;
        assert_eq!(t.viewport.fits().len(), 2);

        let outcome = t.session.activate_base("layer1").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Activated {
                key: "layer1".into(),
                first_load: false
            }
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(t.viewport.fits().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_detach_leaves_no_base_layer() {
        let t = TestSession::new();
        t.session.activate_base("layer1").await;
        t.probe.set_missing("data/Sentinal.tif", true);

        let outcome = t.session.activate_base("layer4").await;
        assert!(matches!(outcome, ActivationOutcome::Failed(_)));
        assert!(t.viewport.base_keys().is_empty());
        assert!(t.session.base().active().is_none());
        assert!(t.status.text().starts_with("Failed to load Sentinal.tif"));
        // the marker is only moved on success
        assert_eq!(t.status.snapshot().active_base.as_deref(), Some("layer1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_is_reported_and_not_attached() {
        let t = TestSession::new();
        let source = t.factory.register("layer4", ScriptedSource::pending());
        source.set_state(SourceState::Error);

        let outcome = t.session.activate_base("layer4").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Failed(LayerError::SourceError {
                layer: "layer4".into()
            })
        );
        assert!(t.viewport.attached_keys().is_empty());
        assert!(t.viewport.fits().is_empty());
        assert!(t.status.text().contains("Sentinal.tif"));

        // construction succeeded, so the entry stays and keeps failing
        assert!(t.session.cache().contains("layer4"));
        let again = t.session.activate_base("layer4").await;
        assert!(matches!(again, ActivationOutcome::Failed(LayerError::SourceError { .. })));
        assert_eq!(t.factory.builds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_activation_cancels_stale_fit() {
        let t = TestSession::new();
        let slow = t.factory.register("layer1", ScriptedSource::pending());

        let (first, second) = tokio::join!(t.session.activate_base("layer1"), async {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            t.session.activate_base("layer3").await
        });

        assert_eq!(
            first,
            ActivationOutcome::Superseded {
                key: "layer1".into()
            }
        );
        assert!(second.is_activated());

        // the stale source becoming ready afterwards must not move the view
        slow.set_view_extent(Some(Extent::new(0.0, 0.0, 1.0, 1.0)));
        slow.set_state(SourceState::Ready);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let fits = t.viewport.fits();
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].extent, happy_extent());
        assert_eq!(t.viewport.base_keys(), vec!["layer3"]);
        assert_eq!(t.status.text(), "Landsat.tif");
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisiting_a_pending_layer_still_frames_it() {
        let t = TestSession::new();
        let slow = t.factory.register("layer3", ScriptedSource::pending());

        let (first, second) = tokio::join!(t.session.activate_base("layer3"), async {
            tokio::time::sleep(Duration::from_millis(600)).await;
            t.session.activate_base("layer4").await
        });
        assert_eq!(
            first,
            ActivationOutcome::Superseded {
                key: "layer3".into()
            }
        );
        assert!(second.is_activated());

        let outcome = t.session.activate_base("layer3").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Activated {
                key: "layer3".into(),
                first_load: false
            }
        );
        assert_eq!(t.viewport.base_keys(), vec!["layer3"]);

        let own = Extent::new(0.0, 0.0, 1.0, 1.0);
        slow.set_view_extent(Some(own));
        slow.set_state(SourceState::Ready);
        tokio::time::sleep(Duration::from_secs(2)).await;

        let fitted: Vec<Extent> = t.viewport.fits().into_iter().map(|f| f.extent).collect();
        assert_eq!(fitted, vec![happy_extent(), own]);
        assert_eq!(t.status.text(), "Landsat.tif");
    }

    #[tokio::test(start_paused = true)]
    async fn test_vector_base_failing_after_attach_is_reported() {
        let t = TestSession::new();
        let source = t.factory.register("layer2", ScriptedSource::pending());

        let outcome = t.session.activate_base("layer2").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Activated {
                key: "layer2".into(),
                first_load: true
            }
        );
        assert_eq!(t.status.text(), "3.geojson");

        source.set_state(SourceState::Error);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(
            t.status.text().starts_with("Failed to load 3.geojson"),
            "status: {}",
            t.status.text()
        );
        assert!(t.viewport.fits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_vector_base_fails_quietly() {
        let t = TestSession::new();
        let source = t.factory.register("layer2", ScriptedSource::pending());

        t.session.activate_base("layer2").await;
        assert!(t.session.activate_base("layer1").await.is_activated());

        source.set_state(SourceState::Error);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(t.status.text(), "my1_rgb_fixed.tif");
        assert_eq!(t.viewport.base_keys(), vec!["layer1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_and_overlay_keys_are_rejected() {
        let t = TestSession::new();

        let outcome = t.session.activate_base("layer9").await;
        assert_eq!(
            outcome,
            ActivationOutcome::Failed(LayerError::UnknownLayer("layer9".into()))
        );
        assert!(t.status.text().contains("layer9"));

        let outcome = t.session.activate_base("points").await;
        assert!(matches!(
            outcome,
            ActivationOutcome::Failed(LayerError::WrongRole { .. })
        ));
        assert_eq!(t.probe.calls(), 0);
    }
}
