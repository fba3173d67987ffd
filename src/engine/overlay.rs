use crate::engine::fitter::ExtentStrategy;
use crate::engine::session::LayerContext;
use crate::error::LayerError;
use crate::models::{layer::Layer, resource::LayerRole};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Attached { key: String, first_load: bool },
    Detached { key: String },
    Failed(LayerError),
}

struct ActiveOverlay {
    layer: Arc<Layer>,
    /// Pending fit-on-load, dropped with the overlay.
    fit: Option<CancellationToken>,
}

/// Vector overlays, each shown or hidden on its own.
///
/// Nothing here touches the base layer.
pub struct VectorOverlaySet {
    ctx: Arc<LayerContext>,
    active: Mutex<HashMap<String, ActiveOverlay>>,
}

impl VectorOverlaySet {
    pub fn new(ctx: Arc<LayerContext>) -> Self {
        VectorOverlaySet {
            ctx,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveOverlay>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Shows the overlay if hidden, hides it if shown.
    pub async fn toggle(&self, key: &str) -> ToggleOutcome {
        match self.try_toggle(key).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(overlay = key, "toggle failed: {}", err);
                self.ctx.status.update(&format!(
                    "Failed to load {}: {}",
                    self.ctx.label(key),
                    err
                ));
                ToggleOutcome::Failed(err)
            }
        }
    }

    async fn try_toggle(&self, key: &str) -> Result<ToggleOutcome, LayerError> {
        let ctx = &self.ctx;
        let spec = ctx.spec(key, LayerRole::Overlay)?;

        let removed = self.lock().remove(key);
        if let Some(overlay) = removed {
            self.hide(key, overlay);
            ctx.status.update(&format!("{} hidden", spec.label));
            return Ok(ToggleOutcome::Detached {
                key: key.to_string(),
            });
        }

        // Probed on every show, even when the layer is cached.
        ctx.probe.probe(&ctx.locator(spec)).await?;
        let lookup = ctx
            .cache
            .get_or_create(key, || async { ctx.build(spec) })
            .await?;

        {
            let mut active = self.lock();
            if active.contains_key(key) {
                // a concurrent toggle got here first
                return Ok(ToggleOutcome::Attached {
                    key: key.to_string(),
                    first_load: false,
                });
            }
            ctx.viewport.attach(lookup.layer.clone());

            let fit = (lookup.fresh && spec.fit_on_load).then(|| {
                let token = CancellationToken::new();
                ctx.fitter.spawn(
                    lookup.layer.source().clone(),
                    lookup.layer.label.clone(),
                    ExtentStrategy::Features,
                    token.clone(),
                );
                token
            });
            active.insert(
                key.to_string(),
                ActiveOverlay {
                    layer: lookup.layer.clone(),
                    fit,
                },
            );
        }

        info!(overlay = key, first_load = lookup.fresh, "overlay shown");
        ctx.status.mark_overlay(key, true);
        ctx.status.update(&format!("{} shown", spec.label));
        Ok(ToggleOutcome::Attached {
            key: key.to_string(),
            first_load: lookup.fresh,
        })
    }

    fn hide(&self, key: &str, overlay: ActiveOverlay) {
        if let Some(token) = overlay.fit {
            token.cancel();
        }
        self.ctx.viewport.detach(&overlay.layer);
        self.ctx.status.mark_overlay(key, false);
        info!(overlay = key, "overlay hidden");
    }

    /// Hides every overlay. Returns how many were shown.
    pub fn clear_all(&self) -> usize {
        let drained: Vec<(String, ActiveOverlay)> = self.lock().drain().collect();
        let count = drained.len();
        for (key, overlay) in drained {
            self.hide(&key, overlay);
        }
        self.ctx.status.update("Overlays cleared");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fitter::VECTOR_FIT;
    use crate::models::extent::Extent;
    use crate::models::resource::{ResourceSpec, VectorStyle};
    use crate::reader::catalog::Catalog;
    use crate::test_support::{ScriptedSource, TestSession};
    use crate::traits::SourceState;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_toggle_cycle_reuses_cached_layer() {
        let t = TestSession::new();

        let outcome = t.session.toggle_overlay("points").await;
        assert_eq!(
            outcome,
            ToggleOutcome::Attached {
                key: "points".into(),
                first_load: true
            }
        );
        assert_eq!(t.probe.calls(), 1);
        let first = t.session.cache().get("points").await.unwrap();

        let outcome = t.session.toggle_overlay("points").await;
        assert_eq!(
            outcome,
            ToggleOutcome::Detached {
                key: "points".into()
            }
        );
        assert_eq!(t.probe.calls(), 1, "hiding must not touch the network");
        assert!(t.viewport.overlay_keys().is_empty());

        let outcome = t.session.toggle_overlay("points").await;
        assert_eq!(
            outcome,
            ToggleOutcome::Attached {
                key: "points".into(),
                first_load: false
            }
        );
        assert_eq!(t.probe.calls(), 2);
        assert_eq!(t.factory.builds(), 1);
        let again = t.session.cache().get("points").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(t.viewport.overlay_keys(), vec!["points"]);
        assert!(t.viewport.fits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggling_one_overlay_leaves_the_rest() {
        let t = TestSession::new();
        t.session.activate_base("layer1").await;
        t.session.toggle_overlay("points").await;
        t.session.toggle_overlay("lines").await;

        t.session.toggle_overlay("points").await;
        assert_eq!(t.viewport.overlay_keys(), vec!["lines"]);
        assert_eq!(t.viewport.base_keys(), vec!["layer1"]);
        assert_eq!(t.session.overlays().active_keys(), vec!["lines"]);
        let markers: Vec<_> = t.status.snapshot().active_overlays.into_iter().collect();
        assert_eq!(markers, vec!["lines".to_string()]);
        assert_eq!(t.status.text(), "Points hidden");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_keeps_base_layer() {
        let t = TestSession::new();
        t.session.activate_base("layer3").await;
        t.session.toggle_overlay("points").await;
        t.session.toggle_overlay("lines").await;

        assert_eq!(t.session.clear_overlays(), 2);
        assert!(t.viewport.overlay_keys().is_empty());
        assert_eq!(t.viewport.base_keys(), vec!["layer3"]);
        assert_eq!(t.session.base().active_key().as_deref(), Some("layer3"));
        assert_eq!(t.status.text(), "Overlays cleared");
        assert!(t.status.snapshot().active_overlays.is_empty());

        assert_eq!(t.session.clear_overlays(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_overlay_is_reported() {
        let t = TestSession::new();
        t.probe.set_missing("data/polygons.geojson", true);

        let outcome = t.session.toggle_overlay("polygons").await;
        assert!(matches!(
            outcome,
            ToggleOutcome::Failed(LayerError::ResourceNotFound { status: 404, .. })
        ));
        assert!(t.viewport.attached_keys().is_empty());
        assert!(!t.session.cache().contains("polygons"));
        assert!(!t.session.overlays().is_active("polygons"));
        assert!(t.status.text().contains("Polygons"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_key_is_not_an_overlay() {
        let t = TestSession::new();
        let outcome = t.session.toggle_overlay("layer1").await;
        assert!(matches!(
            outcome,
            ToggleOutcome::Failed(LayerError::WrongRole { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_shows_attach_once() {
        let t = TestSession::new();
        t.probe.set_latency(Duration::from_millis(100));

        let (a, b) = tokio::join!(
            t.session.toggle_overlay("points"),
            t.session.toggle_overlay("points")
        );

        for outcome in [a, b] {
            assert!(
                matches!(outcome, ToggleOutcome::Attached { .. }),
                "expected an attach, got {:?}",
                outcome
            );
        }
        assert_eq!(t.probe.calls(), 2);
        assert_eq!(t.factory.builds(), 1);
        assert_eq!(t.viewport.overlay_keys(), vec!["points"]);
        assert_eq!(t.viewport.snapshot().layers.len(), 1);
        assert_eq!(t.session.overlays().active_keys(), vec!["points"]);

        // one toggle hides it again
        assert!(matches!(
            t.session.toggle_overlay("points").await,
            ToggleOutcome::Detached { .. }
        ));
        assert!(t.viewport.overlay_keys().is_empty());
    }

    fn fit_on_load_catalog() -> Catalog {
        let style = VectorStyle::stroke("blue", 3.0).unwrap();
        let mut roads = ResourceSpec::vector("roads", LayerRole::Overlay, "roads.geojson", style);
        roads.fit_on_load = true;
        Catalog::new(vec![ResourceSpec::raster("layer1", "a.tif", 0.9), roads]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fit_on_load_waits_for_features() {
        let t = TestSession::with_catalog(fit_on_load_catalog());
        let source = t.factory.register("roads", ScriptedSource::pending());

        assert!(matches!(
            t.session.toggle_overlay("roads").await,
            ToggleOutcome::Attached { .. }
        ));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(t.viewport.fits().is_empty());

        source.set_feature_extent(Some(Extent::new(1.0, 1.0, 2.0, 2.0)));
        source.set_state(SourceState::Ready);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let fits = t.viewport.fits();
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].options, VECTOR_FIT);
        assert_eq!(fits[0].extent, Extent::new(1.0, 1.0, 2.0, 2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hiding_cancels_fit_on_load() {
        let t = TestSession::with_catalog(fit_on_load_catalog());
        let source = t.factory.register("roads", ScriptedSource::pending());

        t.session.toggle_overlay("roads").await;
        t.session.toggle_overlay("roads").await;

        source.set_feature_extent(Some(Extent::new(1.0, 1.0, 2.0, 2.0)));
        source.set_state(SourceState::Ready);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(t.viewport.fits().is_empty());
    }
}
