//! Per-pixel occlusion estimator.
//!
//! For a pixel the estimator reconstructs the view-space origin and a
//! tangent frame, scatters samples through the hemisphere above it,
//! reprojects every sample and checks whether the stored depth at that
//! screen position lies in front of it. Pixels are independent; nothing
//! here reads another pixel's result.

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use crate::frame::FrameSettings;
use crate::kernel::{hemisphere_direction, radial_scale};
use crate::params::{EstimatorMode, CONTRAST, FALL_OFF};
use crate::reconstruct::TangentFrame;
use crate::source::DepthNormalSource;

/// Minimum depth difference, relative to the radius, that counts as occluded.
const OCCLUSION_BIAS: f32 = 0.01;

/// How a single occluded sample contributes.
trait SampleWeight {
    /// Normalization of the accumulated weights.
    const SCALE: f32;

    /// Weight of an occluded sample with local-hemisphere direction `dir`.
    fn weight(dir: Vec3) -> f32;
}

/// Cosine-weighted contribution.
struct AngleWeight;

impl SampleWeight for AngleWeight {
    const SCALE: f32 = TAU;

    fn weight(dir: Vec3) -> f32 {
        // local z is the cosine to the normal
        dir.z.max(0.0)
    }
}

/// Every occluded sample counts once.
struct DistanceWeight;

impl SampleWeight for DistanceWeight {
    const SCALE: f32 = PI;

    fn weight(_dir: Vec3) -> f32 {
        1.0
    }
}

/// Estimates occlusion at `uv`; `0` is open, `1` fully occluded.
pub fn estimate_occlusion<S: DepthNormalSource + ?Sized>(
    source: &S,
    uv: Vec2,
    settings: &FrameSettings,
) -> f32 {
    let variant = settings.variant;
    match (variant.estimator, variant.range_check) {
        (EstimatorMode::AngleBased, true) => estimate::<S, AngleWeight, true>(source, uv, settings),
        (EstimatorMode::AngleBased, false) => {
            estimate::<S, AngleWeight, false>(source, uv, settings)
        }
        (EstimatorMode::DistanceBased, true) => {
            estimate::<S, DistanceWeight, true>(source, uv, settings)
        }
        (EstimatorMode::DistanceBased, false) => {
            estimate::<S, DistanceWeight, false>(source, uv, settings)
        }
    }
}

fn estimate<S, W, const RANGE_CHECK: bool>(source: &S, uv: Vec2, settings: &FrameSettings) -> f32
where
    S: DepthNormalSource + ?Sized,
    W: SampleWeight,
{
    let origin = source.sample(uv);
    let projection = &settings.projection;
    let origin_pos = projection.view_position(uv, origin.depth);
    let frame = TangentFrame::from_normal(origin.normal);
    let radius = settings.radius;
    let count = settings.sample_count.max(1);

    let mut accumulated = 0.0;
    for index in 0..count {
        let dir = hemisphere_direction(uv, index, settings.time);
        let offset = frame.to_view(dir) * (radial_scale(index, count) * radius);
        let sample_pos = origin_pos + offset;

        let sample_uv = projection.project_to_uv(sample_pos);
        let stored = source.sample(sample_uv).depth;
        let dist = sample_pos.z - stored;

        let mut occluded = dist > OCCLUSION_BIAS * radius;
        if RANGE_CHECK {
            occluded &= dist < radius;
        }
        if occluded {
            accumulated += W::weight(dir);
        }
    }

    // far pixels run the loop too and are faded out here
    let fall_off = 1.0 - origin.depth / FALL_OFF;
    let scale = settings.intensity / PI * W::SCALE;
    saturate(accumulated * scale * fall_off / count as f32).powf(CONTRAST)
}

/// Clamps to `[0, 1]`, mapping NaN to zero.
pub fn saturate(x: f32) -> f32 {
    if x > 1.0 {
        1.0
    } else if x > 0.0 {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EffectParameters, SampleCount};
    use crate::reconstruct::Projection;
    use crate::source::SurfaceSample;
    use crate::variant::NormalSource;

    /// Source with one depth at a single UV and another everywhere else.
    struct Occluder {
        origin_uv: Vec2,
        origin_depth: f32,
        occluder_depth: f32,
    }

    impl DepthNormalSource for Occluder {
        fn sample(&self, uv: Vec2) -> SurfaceSample {
            let depth = if uv == self.origin_uv {
                self.origin_depth
            } else {
                self.occluder_depth
            };
            SurfaceSample {
                depth,
                normal: Vec3::NEG_Z,
            }
        }

        fn size(&self) -> (u32, u32) {
            (64, 64)
        }
    }

    /// Camera-facing plane at constant depth.
    struct Plane(f32);

    impl DepthNormalSource for Plane {
        fn sample(&self, _uv: Vec2) -> SurfaceSample {
            SurfaceSample {
                depth: self.0,
                normal: Vec3::NEG_Z,
            }
        }

        fn size(&self) -> (u32, u32) {
            (64, 64)
        }
    }

    fn settings(params: &EffectParameters) -> FrameSettings {
        let projection = Projection::perspective(1.0, 1.0, 0.1, 200.0);
        FrameSettings::resolve(params, projection, NormalSource::DepthNormals, 0.0, 64, 64)
    }

    #[test]
    fn test_open_plane_is_unoccluded() {
        for estimator in [EstimatorMode::AngleBased, EstimatorMode::DistanceBased] {
            let params = EffectParameters::new()
                .with_estimator(estimator)
                .with_radius(0.5)
                .with_intensity(4.0);
            let s = settings(&params);
            for uv in [Vec2::new(0.5, 0.5), Vec2::new(0.1, 0.8)] {
                assert_eq!(estimate_occlusion(&Plane(5.0), uv, &s), 0.0);
            }
        }
    }

    #[test]
    fn test_near_occluder_saturates() {
        for estimator in [EstimatorMode::AngleBased, EstimatorMode::DistanceBased] {
            let params = EffectParameters::new()
                .with_estimator(estimator)
                .with_sample_count(SampleCount::Variable(64))
                .with_range_check(false)
                .with_intensity(4.0);
            let s = settings(&params);
            let uv = Vec2::new(0.5, 0.5);
            let source = Occluder {
                origin_uv: uv,
                origin_depth: 10.0,
                occluder_depth: 1.0,
            };
            let ao = estimate_occlusion(&source, uv, &s);
            assert_eq!(ao, 1.0, "{estimator:?}");
        }
    }

    #[test]
    fn test_range_check_rejects_distant_occluders() {
        let params = EffectParameters::new()
            .with_radius(0.5)
            .with_range_check(true)
            .with_intensity(4.0);
        let s = settings(&params);
        let uv = Vec2::new(0.5, 0.5);
        let source = Occluder {
            origin_uv: uv,
            origin_depth: 10.0,
            occluder_depth: 1.0,
        };
        assert_eq!(estimate_occlusion(&source, uv, &s), 0.0);
    }

    #[test]
    fn test_fall_off_boundary() {
        let params = EffectParameters::new()
            .with_range_check(false)
            .with_intensity(4.0);
        let s = settings(&params);
        let uv = Vec2::new(0.5, 0.5);
        for origin_depth in [FALL_OFF, FALL_OFF * 1.5] {
            let source = Occluder {
                origin_uv: uv,
                origin_depth,
                occluder_depth: 1.0,
            };
            assert_eq!(estimate_occlusion(&source, uv, &s), 0.0);
        }
    }

    #[test]
    fn test_angle_and_distance_scales() {
        // half the samples occluded with unit weight gives intensity / 2 for
        // the distance estimator before contrast
        assert_eq!(<DistanceWeight as SampleWeight>::SCALE / PI, 1.0);
        assert_eq!(<AngleWeight as SampleWeight>::SCALE / PI, 2.0);
        assert_eq!(AngleWeight::weight(Vec3::new(0.0, 0.6, 0.8)), 0.8);
    }

    #[test]
    fn test_saturate_handles_nan() {
        assert_eq!(saturate(f32::NAN), 0.0);
        assert_eq!(saturate(-2.0), 0.0);
        assert_eq!(saturate(3.0), 1.0);
        assert_eq!(saturate(0.25), 0.25);
    }

    #[test]
    fn test_degenerate_normal_stays_finite() {
        struct Zero;
        impl DepthNormalSource for Zero {
            fn sample(&self, _uv: Vec2) -> SurfaceSample {
                SurfaceSample {
                    depth: 3.0,
                    normal: Vec3::ZERO,
                }
            }
            fn size(&self) -> (u32, u32) {
                (1, 1)
            }
        }
        let s = settings(&EffectParameters::new());
        let ao = estimate_occlusion(&Zero, Vec2::splat(0.5), &s);
        assert!((0.0..=1.0).contains(&ao));
    }
}
