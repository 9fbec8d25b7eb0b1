use room_segmentation::{runtime_available, ModelCache, ModelConfig, PreloadReport};
use serde::Serialize;
use tracing::{info, warn};

/// What this process can run, decided once at startup
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// Segmentation model is compiled in and loaded
    pub segmentation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preload: Option<PreloadReport>,
}

impl Capabilities {
    /// Probe the tensor runtime and warm the cache for `config`.
    ///
    /// Never fails; an unusable model only turns the flag off.
    pub fn probe(cache: &ModelCache, config: &ModelConfig) -> Self {
        if !runtime_available() {
            warn!("Segmentation runtime not compiled in, only the hybrid detector will run");
            return Self::hybrid_only();
        }

        let report = cache.preload(config);
        info!(
            "Capability probe: segmentation={} ({}ms)",
            report.loaded, report.elapsed_ms
        );
        Self {
            segmentation: report.loaded,
            preload: Some(report),
        }
    }

    pub fn hybrid_only() -> Self {
        Self {
            segmentation: false,
            preload: None,
        }
    }

    /// Assume segmentation works without loading anything
    pub fn all() -> Self {
        Self {
            segmentation: true,
            preload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_without_runtime_or_with_failed_load_disables_segmentation() {
        let cache = ModelCache::new();
        let config = ModelConfig {
            image_size: 100,
            ..Default::default()
        };

        let caps = Capabilities::probe(&cache, &config);

        assert!(!caps.segmentation);
        assert!(cache.is_empty());
    }
}
