use crate::geometry::projection::{lon_lat_to_mercator, zoom_for_resolution};
use crate::models::{
    extent::Extent,
    layer::Layer,
    resource::{LayerRole, ResourceKind},
};
use crate::traits::{FitOptions, Viewport};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    /// Web Mercator metres.
    pub center: (f64, f64),
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitRecord {
    pub extent: Extent,
    pub options: FitOptions,
    pub camera: Camera,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachedLayer {
    pub key: String,
    pub role: LayerRole,
    pub kind: ResourceKind,
    pub opacity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewportSnapshot {
    /// Bottom to top.
    pub layers: Vec<AttachedLayer>,
    pub camera: Camera,
    pub fit_count: usize,
    pub last_fit: Option<FitRecord>,
}

struct MapState {
    layers: Vec<Arc<Layer>>,
    camera: Camera,
    fits: Vec<FitRecord>,
}

/// Map canvas state kept in memory: the attached layers, the camera, and
/// every fit it has been asked to animate.
pub struct MapViewport {
    size: (f64, f64),
    state: Mutex<MapState>,
}

impl Default for MapViewport {
    fn default() -> Self {
        MapViewport::new((1280.0, 800.0), (56.0, 54.74), 7.0)
    }
}

impl MapViewport {
    /// `center` is lon/lat in degrees, `size` the canvas in pixels.
    pub fn new(size: (f64, f64), center: (f64, f64), zoom: f64) -> Self {
        MapViewport {
            size,
            state: Mutex::new(MapState {
                layers: Vec::new(),
                camera: Camera {
                    center: lon_lat_to_mercator(center.0, center.1),
                    zoom,
                },
                fits: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MapState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Camera that shows `extent` inside the padded canvas, capped at `max_zoom`.
    pub fn camera_for(&self, extent: &Extent, options: &FitOptions) -> Camera {
        let [top, right, bottom, left] = options.padding;
        let width = (self.size.0 - left - right).max(1.0);
        let height = (self.size.1 - top - bottom).max(1.0);
        let resolution = (extent.width() / width).max(extent.height() / height);
        let zoom = if resolution > 0.0 {
            zoom_for_resolution(resolution).min(options.max_zoom)
        } else {
            options.max_zoom
        };
        Camera {
            center: extent.center(),
            zoom,
        }
    }

    pub fn attached_keys(&self) -> Vec<String> {
        self.lock().layers.iter().map(|l| l.key.clone()).collect()
    }

    pub fn base_keys(&self) -> Vec<String> {
        self.keys_with_role(LayerRole::Base)
    }

    pub fn overlay_keys(&self) -> Vec<String> {
        self.keys_with_role(LayerRole::Overlay)
    }

    fn keys_with_role(&self, role: LayerRole) -> Vec<String> {
        self.lock()
            .layers
            .iter()
            .filter(|l| l.role == role)
            .map(|l| l.key.clone())
            .collect()
    }

    pub fn fits(&self) -> Vec<FitRecord> {
        self.lock().fits.clone()
    }

    pub fn camera(&self) -> Camera {
        self.lock().camera
    }

    pub fn snapshot(&self) -> ViewportSnapshot {
        let state = self.lock();
        ViewportSnapshot {
            layers: state
                .layers
                .iter()
                .map(|l| AttachedLayer {
                    key: l.key.clone(),
                    role: l.role,
                    kind: l.kind,
                    opacity: l.opacity,
                })
                .collect(),
            camera: state.camera,
            fit_count: state.fits.len(),
            last_fit: state.fits.last().copied(),
        }
    }
}

impl Viewport for MapViewport {
    fn attach(&self, layer: Arc<Layer>) {
        let mut state = self.lock();
        if state.layers.iter().any(|l| Arc::ptr_eq(l, &layer)) {
            warn!(layer = %layer.key, "layer already attached");
            return;
        }
        info!(layer = %layer.key, role = %layer.role, "layer attached");
        state.layers.push(layer);
    }

    fn detach(&self, layer: &Layer) {
        let mut state = self.lock();
        let before = state.layers.len();
        state.layers.retain(|l| !std::ptr::eq(l.as_ref(), layer));
        if state.layers.len() < before {
            info!(layer = %layer.key, role = %layer.role, "layer detached");
        } else {
            debug!(layer = %layer.key, "detach of a layer that was not attached");
        }
    }

    fn fit_to_extent(&self, extent: Extent, options: FitOptions) {
        let camera = self.camera_for(&extent, &options);
        let mut state = self.lock();
        state.camera = camera;
        state.fits.push(FitRecord {
            extent,
            options,
            camera,
        });
    }
}
