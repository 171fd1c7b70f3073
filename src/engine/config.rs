//! Engine configuration.

use crate::calibration::CalibratorConfig;
use crate::fetch::FetcherConfig;
use crate::position::PositionSourceConfig;
use crate::resolve::RadiusConfig;

/// Top-level engine configuration, one section per component plus the
/// orchestrator's own knobs.
///
/// Upstream deployments of this logic drifted apart on thresholds and
/// sample counts; everything tunable lives here so there is exactly one
/// set of numbers per engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Position source retry and timeout policy.
    pub source: PositionSourceConfig,

    /// Freshness cache policy for the single-flight fetcher.
    pub fetcher: FetcherConfig,

    /// Calibration session policy.
    pub calibrator: CalibratorConfig,

    /// Accuracy-adaptive radius rule.
    pub radius: RadiusConfig,

    /// Hard ceiling on fix accuracy; anything worse skips resolution and
    /// is rejected outright.
    pub max_accuracy_meters: f64,

    /// Minimum blended confidence for acceptance.
    pub confidence_threshold: f64,

    /// Weight of fix quality versus radius margin in the confidence blend.
    pub quality_weight: f64,

    /// Raw displacement that flags a relocation even within the same site.
    pub displacement_threshold_meters: f64,

    /// Identity scope for the last-match record, typically a user or
    /// device id.
    pub scope: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source: PositionSourceConfig::default(),
            fetcher: FetcherConfig::default(),
            calibrator: CalibratorConfig::default(),
            radius: RadiusConfig::default(),
            max_accuracy_meters: 100.0,
            confidence_threshold: 0.65,
            quality_weight: 0.6,
            displacement_threshold_meters: 150.0,
            scope: "default".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults tuned for mobile devices (longer freshness cache).
    pub fn mobile() -> Self {
        Self::default()
    }

    /// Defaults tuned for desktop browsers, where IP-based positioning
    /// changes faster than GPS and the freshness cache must be shorter.
    pub fn desktop() -> Self {
        Self {
            fetcher: FetcherConfig::desktop(),
            ..Self::default()
        }
    }

    /// Set the position source policy.
    pub fn with_source(mut self, source: PositionSourceConfig) -> Self {
        self.source = source;
        self
    }

    /// Set the fetcher policy.
    pub fn with_fetcher(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Set the calibration policy.
    pub fn with_calibrator(mut self, calibrator: CalibratorConfig) -> Self {
        self.calibrator = calibrator;
        self
    }

    /// Set the adaptive radius rule.
    pub fn with_radius(mut self, radius: RadiusConfig) -> Self {
        self.radius = radius;
        self
    }

    /// Set the accuracy ceiling.
    pub fn with_max_accuracy(mut self, meters: f64) -> Self {
        self.max_accuracy_meters = meters;
        self
    }

    /// Set the acceptance threshold.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the quality weight in the confidence blend.
    pub fn with_quality_weight(mut self, weight: f64) -> Self {
        self.quality_weight = weight;
        self
    }

    /// Set the relocation displacement threshold.
    pub fn with_displacement_threshold(mut self, meters: f64) -> Self {
        self.displacement_threshold_meters = meters;
        self
    }

    /// Set the last-match identity scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}
