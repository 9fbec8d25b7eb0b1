//! Registry of loaded models, one per configuration key.
//!
//! Construction is single-flight: callers racing on the same key block on one
//! `OnceCell` while the first builds the model, so weights are loaded once.
//! Different keys build independently. Entries are never evicted.

use crate::error::Result;
use crate::model::{ModelConfig, SegmentationModel};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

type Loader<M> = Box<dyn Fn(&ModelConfig) -> Result<M> + Send + Sync>;

pub struct ModelCache<M = SegmentationModel> {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<M>>>>>,
    loader: Loader<M>,
}

impl ModelCache<SegmentationModel> {
    pub fn new() -> Self {
        Self::with_loader(SegmentationModel::new)
    }
}

impl Default for ModelCache<SegmentationModel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelCache<M> {
    /// Cache that builds entries with `loader` instead of the real network
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn(&ModelConfig) -> Result<M> + Send + Sync + 'static,
    {
        Self {
            entries: Mutex::new(HashMap::new()),
            loader: Box::new(loader),
        }
    }

    /// Return the model for `config`, building it on first use.
    ///
    /// A failed build leaves the slot empty; the next call retries.
    pub fn get_or_create(&self, config: &ModelConfig) -> Result<Arc<M>> {
        let key = config.cache_key();
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let model = cell.get_or_try_init(|| {
            info!("Constructing model for {}", key);
            let start = Instant::now();
            let model = (self.loader)(config)?;
            info!("Model for {} ready in {}ms", key, start.elapsed().as_millis());
            Ok::<_, crate::SegmentationError>(Arc::new(model))
        })?;

        Ok(Arc::clone(model))
    }

    /// Whether a built model exists for `config`
    pub fn contains(&self, config: &ModelConfig) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&config.cache_key())
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Number of built models
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force the first construction for `config` ahead of traffic.
    ///
    /// Failures are logged and reported, never propagated.
    pub fn preload(&self, config: &ModelConfig) -> PreloadReport {
        let start = Instant::now();
        info!("Preloading segmentation model ({})", config.cache_key());

        let error = match self.get_or_create(config) {
            Ok(_) => {
                info!("Segmentation model preloaded");
                None
            }
            Err(e) => {
                warn!("Failed to preload segmentation model: {}", e);
                Some(e.to_string())
            }
        };

        PreloadReport {
            key: config.cache_key(),
            loaded: error.is_none(),
            elapsed_ms: start.elapsed().as_millis(),
            error,
        }
    }
}

/// Outcome of [`ModelCache::preload`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadReport {
    pub key: String,
    pub loaded: bool,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentationError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Dummy(usize);

    fn counting_cache(counter: Arc<AtomicUsize>) -> ModelCache<Dummy> {
        ModelCache::with_loader(move |_config| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(Dummy(counter.fetch_add(1, Ordering::SeqCst)))
        })
    }

    #[test]
    fn test_same_key_returns_same_instance() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(counter.clone());
        let config = ModelConfig::default();

        let a = cache.get_or_create(&config).unwrap();
        let b = cache.get_or_create(&config).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&config));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys_build_distinct_models() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(counter.clone());
        let small = ModelConfig {
            image_size: 256,
            ..Default::default()
        };

        let a = cache.get_or_create(&ModelConfig::default()).unwrap();
        let b = cache.get_or_create(&small).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_first_calls_construct_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(counter.clone());
        let config = ModelConfig::default();

        let models: Vec<Arc<Dummy>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.get_or_create(&config).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
        assert_eq!(models[0].0, 0);
    }

    #[test]
    fn test_failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let cache = ModelCache::with_loader(move |_config| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SegmentationError::Inference("transient".to_string()))
            } else {
                Ok(Dummy(1))
            }
        });
        let config = ModelConfig::default();

        assert!(cache.get_or_create(&config).is_err());
        assert!(!cache.contains(&config));
        assert!(cache.get_or_create(&config).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preload_reports_failure_without_panicking() {
        let cache: ModelCache<Dummy> = ModelCache::with_loader(|_config| {
            Err(SegmentationError::RuntimeUnavailable("no runtime".to_string()))
        });

        let report = cache.preload(&ModelConfig::default());

        assert!(!report.loaded);
        assert!(report.error.unwrap().contains("no runtime"));
        assert!(cache.is_empty());
    }
}
