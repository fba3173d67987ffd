use crate::engine::fitter::POLL_INTERVAL;
use crate::reader::probe::{HttpProbe, LocalProbe};
use crate::traits::ResourceProbe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where layer files live.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Local(PathBuf),
    /// Base URL, files are fetched as `<base>/<path>`.
    Http(String),
}

impl Source {
    /// Full locator for a catalog path.
    pub fn locate(&self, path: &str) -> String {
        match self {
            Source::Local(root) => root.join(path).to_string_lossy().into_owned(),
            Source::Http(base) => format!("{}/{}", base.trim_end_matches('/'), path),
        }
    }

    pub fn probe(&self) -> anyhow::Result<Arc<dyn ResourceProbe>> {
        Ok(match self {
            Source::Local(_) => Arc::new(LocalProbe),
            Source::Http(_) => Arc::new(HttpProbe::new()?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    /// CSV catalog replacing the built-in layer set.
    pub catalog: Option<PathBuf>,
    pub port: u16,
    pub poll_interval: Duration,
    /// Base layer activated before the server starts taking requests.
    pub initial_layer: Option<String>,
    /// Canvas size in pixels, used to derive the camera after a fit.
    pub viewport_size: (f64, f64),
    /// lon/lat degrees
    pub initial_center: (f64, f64),
    pub initial_zoom: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: Source::Local(PathBuf::from("data")),
            catalog: None,
            port: 8000,
            poll_interval: POLL_INTERVAL,
            initial_layer: Some("layer1".to_string()),
            viewport_size: (1280.0, 800.0),
            initial_center: (56.0, 54.74),
            initial_zoom: 7.0,
        }
    }
}
