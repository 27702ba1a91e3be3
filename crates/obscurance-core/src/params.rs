//! Ambient obscurance configuration.
//!
//! Values are clamped when they are set, so whatever is read back from an
//! [`EffectParameters`] is exactly what the passes consume.

use serde::{Deserialize, Serialize};

/// Smallest radius the effect will use.
pub const RADIUS_FLOOR: f32 = 1e-5;

/// Upper bound of the intensity slider.
pub const MAX_INTENSITY: f32 = 4.0;

/// Bounds of [`SampleCount::Variable`].
pub const MIN_SAMPLE_COUNT: u32 = 1;
pub const MAX_SAMPLE_COUNT: u32 = 120;

/// Sample count used by [`SampleCount::Variable`] when none is given.
pub const DEFAULT_VARIABLE_SAMPLES: u32 = 20;

/// Exponent applied to the saturated occlusion value.
pub const CONTRAST: f32 = 0.6;

/// View-space distance at which occlusion has faded out completely.
pub const FALL_OFF: f32 = 100.0;

/// Which occlusion estimator the effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EstimatorMode {
    /// Each occluded sample is weighted by the cosine to the surface normal.
    #[default]
    AngleBased,
    /// Each occluded sample counts once.
    DistanceBased,
}

/// Effect-side sample count setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleCount {
    Low,
    Medium,
    /// User-supplied count, clamped to `[1, 120]`.
    Variable(u32),
}

impl Default for SampleCount {
    fn default() -> Self {
        Self::Medium
    }
}

impl SampleCount {
    /// Variable sample count at its default of 20.
    pub const DEFAULT_VARIABLE: Self = Self::Variable(DEFAULT_VARIABLE_SAMPLES);

    /// Creates a variable sample count, clamping into the supported range.
    pub fn variable(count: u32) -> Self {
        Self::Variable(count.clamp(MIN_SAMPLE_COUNT, MAX_SAMPLE_COUNT))
    }

    /// Number of samples taken per pixel.
    pub fn count(self) -> u32 {
        match self {
            Self::Low => 8,
            Self::Medium => 16,
            Self::Variable(n) => n.clamp(MIN_SAMPLE_COUNT, MAX_SAMPLE_COUNT),
        }
    }
}

/// Strength of the noise filter run over the occlusion mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NoiseFilter {
    /// No filtering; the raw mask is composited.
    None,
    /// 3-tap separable filter.
    #[default]
    Narrow,
    /// 5-tap separable filter.
    Wide,
}

impl NoiseFilter {
    /// Maps a numeric level (0, 1, 2) to a filter; larger levels clamp to `Wide`.
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => Self::None,
            1 => Self::Narrow,
            _ => Self::Wide,
        }
    }

    /// Numeric level of this filter.
    pub fn level(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Narrow => 1,
            Self::Wide => 2,
        }
    }
}

/// Obscurance effect configuration, set by the host before each frame.
///
/// Deserialized values pass through the same clamps as the setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEffectParameters")]
pub struct EffectParameters {
    intensity: f32,
    radius: f32,
    estimator: EstimatorMode,
    sample_count: SampleCount,
    noise_filter: NoiseFilter,
    downsampling: bool,
    range_check: bool,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            radius: 0.3,
            estimator: EstimatorMode::default(),
            sample_count: SampleCount::default(),
            noise_filter: NoiseFilter::default(),
            downsampling: false,
            range_check: true,
        }
    }
}

/// Unvalidated field values as they appear in serialized form.
#[derive(Deserialize)]
#[serde(default)]
struct RawEffectParameters {
    intensity: f32,
    radius: f32,
    estimator: EstimatorMode,
    sample_count: SampleCount,
    noise_filter: NoiseFilter,
    downsampling: bool,
    range_check: bool,
}

impl Default for RawEffectParameters {
    fn default() -> Self {
        let params = EffectParameters::default();
        Self {
            intensity: params.intensity,
            radius: params.radius,
            estimator: params.estimator,
            sample_count: params.sample_count,
            noise_filter: params.noise_filter,
            downsampling: params.downsampling,
            range_check: params.range_check,
        }
    }
}

impl From<RawEffectParameters> for EffectParameters {
    fn from(raw: RawEffectParameters) -> Self {
        Self::new()
            .with_intensity(raw.intensity)
            .with_radius(raw.radius)
            .with_estimator(raw.estimator)
            .with_sample_count(raw.sample_count)
            .with_noise_filter(raw.noise_filter)
            .with_downsampling(raw.downsampling)
            .with_range_check(raw.range_check)
    }
}

impl EffectParameters {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the intensity (clamped to `[0, 4]`).
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.set_intensity(intensity);
        self
    }

    /// Sets the radius (floored at [`RADIUS_FLOOR`]).
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.set_radius(radius);
        self
    }

    /// Sets the estimator.
    pub fn with_estimator(mut self, estimator: EstimatorMode) -> Self {
        self.estimator = estimator;
        self
    }

    /// Sets the sample count.
    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.set_sample_count(sample_count);
        self
    }

    /// Sets the noise filter.
    pub fn with_noise_filter(mut self, noise_filter: NoiseFilter) -> Self {
        self.noise_filter = noise_filter;
        self
    }

    /// Enables or disables half-resolution estimation.
    pub fn with_downsampling(mut self, downsampling: bool) -> Self {
        self.downsampling = downsampling;
        self
    }

    /// Enables or disables rejection of occluders farther than the radius.
    pub fn with_range_check(mut self, range_check: bool) -> Self {
        self.range_check = range_check;
        self
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        let clamped = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, MAX_INTENSITY)
        };
        if clamped != intensity {
            log::warn!("obscurance intensity {intensity} clamped to {clamped}");
        }
        self.intensity = clamped;
    }

    pub fn set_radius(&mut self, radius: f32) {
        // NaN fails the comparison and lands on the floor as well
        let clamped = if radius > RADIUS_FLOOR {
            radius
        } else {
            RADIUS_FLOOR
        };
        if clamped != radius {
            log::warn!("obscurance radius {radius} clamped to {clamped}");
        }
        self.radius = clamped;
    }

    pub fn set_sample_count(&mut self, sample_count: SampleCount) {
        self.sample_count = match sample_count {
            SampleCount::Variable(n) => SampleCount::variable(n),
            other => other,
        };
    }

    pub fn set_estimator(&mut self, estimator: EstimatorMode) {
        self.estimator = estimator;
    }

    pub fn set_noise_filter(&mut self, noise_filter: NoiseFilter) {
        self.noise_filter = noise_filter;
    }

    pub fn set_downsampling(&mut self, downsampling: bool) {
        self.downsampling = downsampling;
    }

    pub fn set_range_check(&mut self, range_check: bool) {
        self.range_check = range_check;
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn estimator(&self) -> EstimatorMode {
        self.estimator
    }

    pub fn sample_count(&self) -> SampleCount {
        self.sample_count
    }

    pub fn noise_filter(&self) -> NoiseFilter {
        self.noise_filter
    }

    pub fn downsampling(&self) -> bool {
        self.downsampling
    }

    pub fn range_check(&self) -> bool {
        self.range_check
    }

    /// Divisor applied to the frame size for the occlusion mask.
    pub fn downsample_divisor(&self) -> u32 {
        if self.downsampling {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parameters_default() {
        let params = EffectParameters::default();
        assert_eq!(params.intensity(), 1.0);
        assert_eq!(params.radius(), 0.3);
        assert_eq!(params.estimator(), EstimatorMode::AngleBased);
        assert_eq!(params.sample_count(), SampleCount::Medium);
        assert_eq!(params.noise_filter(), NoiseFilter::Narrow);
        assert!(!params.downsampling());
        assert!(params.range_check());
    }

    #[test]
    fn test_radius_clamped_on_set() {
        let mut params = EffectParameters::new();
        params.set_radius(0.0);
        assert_eq!(params.radius(), RADIUS_FLOOR);
        params.set_radius(-3.0);
        assert_eq!(params.radius(), RADIUS_FLOOR);
        params.set_radius(f32::NAN);
        assert_eq!(params.radius(), RADIUS_FLOOR);
        params.set_radius(2.5);
        assert_eq!(params.radius(), 2.5);
    }

    #[test]
    fn test_sample_count_tiers() {
        assert_eq!(SampleCount::Low.count(), 8);
        assert_eq!(SampleCount::Medium.count(), 16);
        assert_eq!(SampleCount::variable(0).count(), 1);
        assert_eq!(SampleCount::variable(500).count(), 120);
        assert_eq!(SampleCount::DEFAULT_VARIABLE.count(), 20);
    }

    #[test]
    fn test_sample_count_clamped_on_set() {
        let params = EffectParameters::new().with_sample_count(SampleCount::Variable(1000));
        assert_eq!(params.sample_count(), SampleCount::Variable(MAX_SAMPLE_COUNT));
    }

    #[test]
    fn test_deserialize_clamps_out_of_range_values() {
        let json = r#"{
            "intensity": 9.0,
            "radius": -1.0,
            "estimator": "DistanceBased",
            "sample_count": { "Variable": 500 },
            "noise_filter": "Wide",
            "downsampling": true,
            "range_check": false
        }"#;
        let params: EffectParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.intensity(), MAX_INTENSITY);
        assert_eq!(params.radius(), RADIUS_FLOOR);
        assert_eq!(params.sample_count(), SampleCount::Variable(MAX_SAMPLE_COUNT));
        assert_eq!(params.estimator(), EstimatorMode::DistanceBased);
        assert_eq!(params.noise_filter(), NoiseFilter::Wide);
        assert!(params.downsampling());
        assert!(!params.range_check());
    }

    #[test]
    fn test_serialized_parameters_round_trip() {
        let params = EffectParameters::new()
            .with_radius(0.75)
            .with_sample_count(SampleCount::DEFAULT_VARIABLE);
        let json = serde_json::to_string(&params).unwrap();
        let back: EffectParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);

        // missing fields take their defaults
        let partial: EffectParameters = serde_json::from_str(r#"{"radius": 2.0}"#).unwrap();
        assert_eq!(partial, EffectParameters::new().with_radius(2.0));
    }

    #[test]
    fn test_noise_filter_levels() {
        assert_eq!(NoiseFilter::from_level(0), NoiseFilter::None);
        assert_eq!(NoiseFilter::from_level(1), NoiseFilter::Narrow);
        assert_eq!(NoiseFilter::from_level(2), NoiseFilter::Wide);
        assert_eq!(NoiseFilter::from_level(9), NoiseFilter::Wide);
        assert_eq!(NoiseFilter::Wide.level(), 2);
    }

    #[test]
    fn test_downsample_divisor() {
        assert_eq!(EffectParameters::new().downsample_divisor(), 1);
        assert_eq!(
            EffectParameters::new()
                .with_downsampling(true)
                .downsample_divisor(),
            2
        );
    }

    proptest! {
        #[test]
        fn prop_radius_read_back_is_positive(radius in -10.0f32..10.0) {
            let params = EffectParameters::new().with_radius(radius);
            prop_assert!(params.radius() >= RADIUS_FLOOR);
            // setting the read-back value again is a no-op
            let again = params.clone().with_radius(params.radius());
            prop_assert_eq!(again.radius(), params.radius());
        }

        #[test]
        fn prop_intensity_in_range(intensity in -10.0f32..10.0) {
            let params = EffectParameters::new().with_intensity(intensity);
            prop_assert!((0.0..=MAX_INTENSITY).contains(&params.intensity()));
        }

        #[test]
        fn prop_variable_count_in_range(count in 0u32..10_000) {
            let n = SampleCount::variable(count).count();
            prop_assert!((MIN_SAMPLE_COUNT..=MAX_SAMPLE_COUNT).contains(&n));
        }
    }
}
