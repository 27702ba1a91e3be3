//! Program variant table keys.
//!
//! A variant names one specialization of the estimator program. The GPU
//! backend compiles one pipeline per variant; the CPU estimator picks a
//! monomorphized inner loop per variant.

use crate::params::{EffectParameters, EstimatorMode, SampleCount};

/// Program-side sample count tiers.
///
/// These are kept separate from the effect-side [`SampleCount`]; the two
/// tables are related only through [`SampleTier::for_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleTier {
    Low8,
    Medium16,
    High24,
    Ultra80,
    /// Count supplied at run time.
    Dynamic,
}

impl SampleTier {
    /// Fixed tiers, in ascending order.
    pub const FIXED: [SampleTier; 4] = [Self::Low8, Self::Medium16, Self::High24, Self::Ultra80];

    /// Compiled-in sample count, or `None` for [`SampleTier::Dynamic`].
    pub fn fixed_count(self) -> Option<u32> {
        match self {
            Self::Low8 => Some(8),
            Self::Medium16 => Some(16),
            Self::High24 => Some(24),
            Self::Ultra80 => Some(80),
            Self::Dynamic => None,
        }
    }

    /// Tier that runs `sample_count`.
    pub fn for_count(sample_count: SampleCount) -> Self {
        match sample_count {
            SampleCount::Low => Self::Low8,
            SampleCount::Medium => Self::Medium16,
            SampleCount::Variable(n) => Self::FIXED
                .into_iter()
                .find(|tier| tier.fixed_count() == Some(n))
                .unwrap_or(Self::Dynamic),
        }
    }
}

/// Where depth and normals come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NormalSource {
    /// Dedicated packed depth+normal buffer.
    #[default]
    DepthNormals,
    /// G-buffer normal channel plus hardware depth.
    GBuffer,
}

/// One specialization of the estimator program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramVariant {
    pub estimator: EstimatorMode,
    pub tier: SampleTier,
    pub range_check: bool,
    pub source: NormalSource,
}

impl ProgramVariant {
    /// Variant selected by a configuration and a normal source.
    pub fn select(params: &EffectParameters, source: NormalSource) -> Self {
        Self {
            estimator: params.estimator(),
            tier: SampleTier::for_count(params.sample_count()),
            range_check: params.range_check(),
            source,
        }
    }

    /// Short label, used for pipeline names and logs.
    pub fn label(&self) -> String {
        let estimator = match self.estimator {
            EstimatorMode::AngleBased => "angle",
            EstimatorMode::DistanceBased => "distance",
        };
        let tier = match self.tier.fixed_count() {
            Some(n) => n.to_string(),
            None => "dyn".to_string(),
        };
        let source = match self.source {
            NormalSource::DepthNormals => "dn",
            NormalSource::GBuffer => "gbuf",
        };
        let range = if self.range_check { "rc" } else { "norc" };
        format!("{estimator}-{tier}-{range}-{source}")
    }
}
