//! Scripted collaborators for engine tests.

use crate::config::Source;
use crate::engine::session::Session;
use crate::engine::status::StatusBoard;
use crate::error::LayerError;
use crate::models::{extent::Extent, resource::ResourceSpec};
use crate::reader::catalog::Catalog;
use crate::traits::{ResourceProbe, SourceFactory, SourceState, SpatialSource};
use crate::viewport::MapViewport;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct Script {
    state: SourceState,
    view: Option<Extent>,
    tile_grid: Option<Extent>,
    features: Option<Extent>,
}

/// Source whose state and extents are set by the test.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<Script>,
    samples: AtomicUsize,
}

impl ScriptedSource {
    pub fn pending() -> Self {
        ScriptedSource {
            script: Mutex::new(Script {
                state: SourceState::Pending,
                view: None,
                tile_grid: None,
                features: None,
            }),
            samples: AtomicUsize::new(0),
        }
    }

    pub fn ready_with_view(extent: Extent) -> Self {
        let source = Self::pending();
        source.set_view_extent(Some(extent));
        source.set_state(SourceState::Ready);
        source
    }

    pub fn set_state(&self, state: SourceState) {
        self.script.lock().unwrap().state = state;
    }

    pub fn set_view_extent(&self, extent: Option<Extent>) {
        self.script.lock().unwrap().view = extent;
    }

    pub fn set_tile_grid_extent(&self, extent: Option<Extent>) {
        self.script.lock().unwrap().tile_grid = extent;
    }

    pub fn set_feature_extent(&self, extent: Option<Extent>) {
        self.script.lock().unwrap().features = extent;
    }

    /// How many times the state has been read.
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl SpatialSource for ScriptedSource {
    fn state(&self) -> SourceState {
        self.samples.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().state
    }

    fn view_extent(&self) -> Option<Extent> {
        self.script.lock().unwrap().view
    }

    fn tile_grid_extent(&self) -> Option<Extent> {
        self.script.lock().unwrap().tile_grid
    }

    fn feature_extent(&self) -> Option<Extent> {
        self.script.lock().unwrap().features
    }
}

/// Probe that fails with 404 for chosen locators and counts every call.
#[derive(Default)]
pub struct CountingProbe {
    missing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
}

impl CountingProbe {
    pub fn set_missing(&self, locator: &str, missing: bool) {
        let mut set = self.missing.lock().unwrap();
        if missing {
            set.insert(locator.to_string());
        } else {
            set.remove(locator);
        }
    }

    /// Every later probe sleeps this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, locator: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == locator)
            .count()
    }
}

#[async_trait]
impl ResourceProbe for CountingProbe {
    async fn probe(&self, locator: &str) -> Result<(), LayerError> {
        self.calls.lock().unwrap().push(locator.to_string());
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.missing.lock().unwrap().contains(locator) {
            return Err(LayerError::ResourceNotFound {
                resource: locator.to_string(),
                status: 404,
                reason: "Not Found".into(),
            });
        }
        Ok(())
    }
}

/// Hands out one [`ScriptedSource`] per key. Unregistered keys get a source
/// that is already ready with extent `[10, 20, 30, 40]`.
#[derive(Default)]
pub struct ScriptedFactory {
    sources: Mutex<HashMap<String, Arc<ScriptedSource>>>,
    builds: AtomicUsize,
}

impl ScriptedFactory {
    pub fn register(&self, key: &str, source: ScriptedSource) -> Arc<ScriptedSource> {
        let source = Arc::new(source);
        self.sources
            .lock()
            .unwrap()
            .insert(key.to_string(), source.clone());
        source
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

pub fn happy_extent() -> Extent {
    Extent::new(10.0, 20.0, 30.0, 40.0)
}

impl SourceFactory for ScriptedFactory {
    fn build(
        &self,
        spec: &ResourceSpec,
        _locator: &str,
    ) -> Result<Arc<dyn SpatialSource>, LayerError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let source: Arc<dyn SpatialSource> = self
            .sources
            .lock()
            .unwrap()
            .entry(spec.key.clone())
            .or_insert_with(|| {
                let source = ScriptedSource::ready_with_view(happy_extent());
                source.set_feature_extent(Some(happy_extent()));
                Arc::new(source)
            })
            .clone();
        Ok(source)
    }
}

/// A session over the built-in catalog with every collaborator observable.
pub struct TestSession {
    pub session: Session,
    pub viewport: Arc<MapViewport>,
    pub status: Arc<StatusBoard>,
    pub probe: Arc<CountingProbe>,
    pub factory: Arc<ScriptedFactory>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::with_catalog(Catalog::builtin())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let viewport = Arc::new(MapViewport::default());
        let status = Arc::new(StatusBoard::default());
        let probe = Arc::new(CountingProbe::default());
        let factory = Arc::new(ScriptedFactory::default());
        let session = Session::new(
            catalog,
            Source::Local(PathBuf::from("data")),
            viewport.clone(),
            status.clone(),
            probe.clone(),
            factory.clone(),
            Duration::from_millis(500),
        );
        TestSession {
            session,
            viewport,
            status,
            probe,
            factory,
        }
    }
}
