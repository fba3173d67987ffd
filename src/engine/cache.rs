use crate::error::LayerError;
use crate::models::layer::Layer;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;

/// Result of a cache lookup. `fresh` is set only for the call whose
/// constructor actually built the layer.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub layer: Arc<Layer>,
    pub fresh: bool,
}

/// Session-lifetime store of layers, one instance per key.
///
/// There is no capacity bound and no eviction: once a layer is built it is
/// reused verbatim for every later activation. A constructor that fails
/// leaves no entry behind, so the next request tries again.
#[derive(Clone)]
pub struct LayerCache {
    layers: Cache<String, Arc<Layer>>,
}

impl Default for LayerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerCache {
    pub fn new() -> Self {
        LayerCache {
            layers: Cache::builder().name("layers").build(),
        }
    }

    /// Returns the cached layer for `key`, or runs `constructor` once to build it.
    ///
    /// Concurrent callers for the same missing key share one construction.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &str,
        constructor: F,
    ) -> Result<CacheLookup, LayerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Layer, LayerError>>,
    {
        let entry = self
            .layers
            .entry_by_ref(key)
            .or_try_insert_with(async move { constructor().await.map(Arc::new) })
            .await
            .map_err(Arc::unwrap_or_clone)?;

        Ok(CacheLookup {
            fresh: entry.is_fresh(),
            layer: entry.into_value(),
        })
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Layer>> {
        self.layers.get(key).await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.layers.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.layers.iter().map(|(k, _)| (*k).clone()).collect();
        keys.sort();
        keys
    }
}
