//! Per-frame snapshot of everything the passes consume.

use crate::params::EffectParameters;
use crate::reconstruct::Projection;
use crate::variant::{NormalSource, ProgramVariant};

/// Resolved settings for one frame.
///
/// Built once from [`EffectParameters`] before any pass runs and never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub radius: f32,
    pub intensity: f32,
    pub sample_count: u32,
    pub variant: ProgramVariant,
    pub projection: Projection,
    /// Host time in seconds; the kernel coarsens it further.
    pub time: f32,
    /// Destination size.
    pub width: u32,
    pub height: u32,
    /// Occlusion mask size (destination size divided by the downsample factor).
    pub mask_width: u32,
    pub mask_height: u32,
}

impl FrameSettings {
    pub fn resolve(
        params: &EffectParameters,
        projection: Projection,
        source: NormalSource,
        time: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let (mask_width, mask_height) = mask_size(params, width, height);
        Self {
            radius: params.radius(),
            intensity: params.intensity(),
            sample_count: params.sample_count().count(),
            variant: ProgramVariant::select(params, source),
            projection,
            time,
            width,
            height,
            mask_width,
            mask_height,
        }
    }
}

/// Occlusion mask size for a frame of `width` x `height`.
pub fn mask_size(params: &EffectParameters, width: u32, height: u32) -> (u32, u32) {
    let divisor = params.downsample_divisor();
    ((width / divisor).max(1), (height / divisor).max(1))
}
