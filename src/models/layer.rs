use crate::geometry::projection::{lon_lat_to_mercator, mercator_to_lon_lat};
use crate::models::extent::Extent;
use crate::models::resource::{LayerRole, ResourceKind, ResourceSpec, SourceOptions, VectorStyle};
use crate::traits::{SourceState, SpatialSource};
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Web Mercator, the projection the viewport works in.
pub const VIEWPORT_CRS: i32 = 3857;

/// A renderable unit: one spatial source plus how it is presented.
///
/// Built once per key and shared as `Arc<Layer>`; the viewport only ever
/// gains or loses a reference to it.
pub struct Layer {
    pub key: String,
    pub label: String,
    pub role: LayerRole,
    pub kind: ResourceKind,
    pub opacity: f32,
    pub options: SourceOptions,
    pub style: Option<VectorStyle>,
    source: Arc<dyn SpatialSource>,
}

impl Layer {
    pub fn from_spec(spec: &ResourceSpec, source: Arc<dyn SpatialSource>) -> Self {
        Layer {
            key: spec.key.clone(),
            label: spec.label.clone(),
            role: spec.role,
            kind: spec.kind,
            opacity: spec.opacity,
            options: spec.options.clone(),
            style: spec.style.clone(),
            source,
        }
    }

    pub fn source(&self) -> &Arc<dyn SpatialSource> {
        &self.source
    }

    pub fn state(&self) -> SourceState {
        self.source.state()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("key", &self.key)
            .field("role", &self.role)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerGeometry {
    pub crs_code: i32,
    pub extent: Extent,
}

impl LayerGeometry {
    /// Fast path between 4326 and 3857, PROJ for anything else
    pub fn project(&self, target_crs: i32) -> anyhow::Result<Self> {
        if self.crs_code == target_crs {
            return Ok(self.clone());
        }

        let e = &self.extent;
        let extent = match (self.crs_code, target_crs) {
            (4326, 3857) => {
                let (minx, miny) = lon_lat_to_mercator(e.minx, e.miny);
                let (maxx, maxy) = lon_lat_to_mercator(e.maxx, e.maxy);
                Extent::from((minx, miny, maxx, maxy))
            }
            (3857, 4326) => {
                let (minx, miny) = mercator_to_lon_lat(e.minx, e.miny);
                let (maxx, maxy) = mercator_to_lon_lat(e.maxx, e.maxy);
                Extent::from((minx, miny, maxx, maxy))
            }
            _ => {
                let proj = proj::Proj::new_known_crs(
                    &format!("EPSG:{}", self.crs_code),
                    &format!("EPSG:{}", target_crs),
                    None,
                )
                .with_context(|| {
                    format!("no transform from EPSG:{} to EPSG:{}", self.crs_code, target_crs)
                })?;
                let (minx, miny) = proj.convert((e.minx, e.miny))?;
                let (maxx, maxy) = proj.convert((e.maxx, e.maxy))?;
                Extent::from((minx, miny, maxx, maxy))
            }
        };

        Ok(LayerGeometry {
            crs_code: target_crs,
            extent,
        })
    }

    pub fn to_viewport(&self) -> anyhow::Result<Extent> {
        Ok(self.project(VIEWPORT_CRS)?.extent)
    }
}
