//! Separable noise filter for the occlusion mask.
//!
//! Taps are binomial weights along one axis. Each tap is additionally
//! weighted by how closely its normal matches the center normal, so the
//! filter does not smear occlusion across creases.

use glam::{Vec2, Vec3};

use crate::params::NoiseFilter;
use crate::source::DepthNormalSource;
use crate::surface::{texel_center, MaskSurface};

const NARROW_WEIGHTS: [f32; 3] = [0.25, 0.5, 0.25];
const WIDE_WEIGHTS: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Lower edge of the normal-similarity ramp.
const GEOMETRY_THRESHOLD: f32 = 0.8;

/// Tap count of the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterWidth {
    /// 3 taps.
    Narrow,
    /// 5 taps.
    Wide,
}

impl FilterWidth {
    /// Filter width for a noise filter setting, `None` when filtering is off.
    pub fn for_filter(filter: NoiseFilter) -> Option<Self> {
        match filter {
            NoiseFilter::None => None,
            NoiseFilter::Narrow => Some(Self::Narrow),
            NoiseFilter::Wide => Some(Self::Wide),
        }
    }

    /// Symmetric tap weights, summing to one.
    pub fn weights(self) -> &'static [f32] {
        match self {
            Self::Narrow => &NARROW_WEIGHTS,
            Self::Wide => &WIDE_WEIGHTS,
        }
    }
}

/// Direction of one filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

impl BlurAxis {
    /// Texel step along this axis.
    pub fn step(self) -> (i32, i32) {
        match self {
            Self::Horizontal => (1, 0),
            Self::Vertical => (0, 1),
        }
    }

    /// Step in UV units for a surface of the given size.
    pub fn uv_step(self, width: u32, height: u32) -> Vec2 {
        let (dx, dy) = self.step();
        Vec2::new(dx as f32 / width as f32, dy as f32 / height as f32)
    }
}

/// Edge weight between two normals: 1 for parallel normals, 0 past ~37 degrees.
pub fn normal_similarity(a: Vec3, b: Vec3) -> f32 {
    smoothstep(GEOMETRY_THRESHOLD, 1.0, a.dot(b))
}

/// Filters one texel of `mask` along `axis`.
pub fn filter_texel<S: DepthNormalSource + ?Sized>(
    mask: &MaskSurface,
    source: &S,
    x: u32,
    y: u32,
    axis: BlurAxis,
    width: FilterWidth,
) -> f32 {
    let (w, h) = mask.size();
    let center_normal = source.sample(texel_center(x, y, w, h)).normal;
    let weights = width.weights();
    let half = (weights.len() / 2) as i32;
    let (dx, dy) = axis.step();

    let mut sum = 0.0;
    let mut total = 0.0;
    for (i, &weight) in weights.iter().enumerate() {
        let k = i as i32 - half;
        let tx = clamp_texel(x as i32 + dx * k, w);
        let ty = clamp_texel(y as i32 + dy * k, h);
        let geometry = if k == 0 {
            1.0
        } else {
            let normal = source.sample(texel_center(tx, ty, w, h)).normal;
            normal_similarity(center_normal, normal)
        };
        sum += mask.value(tx, ty) * weight * geometry;
        total += weight * geometry;
    }
    sum / total
}

fn clamp_texel(c: i32, extent: u32) -> u32 {
    c.clamp(0, extent as i32 - 1) as u32
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SurfaceSample;
    use proptest::prelude::*;

    struct Flat;

    impl DepthNormalSource for Flat {
        fn sample(&self, _uv: Vec2) -> SurfaceSample {
            SurfaceSample {
                depth: 1.0,
                normal: Vec3::NEG_Z,
            }
        }
        fn size(&self) -> (u32, u32) {
            (8, 1)
        }
    }

    /// Left half faces the camera, right half faces +X.
    struct Crease;

    impl DepthNormalSource for Crease {
        fn sample(&self, uv: Vec2) -> SurfaceSample {
            let normal = if uv.x < 0.5 { Vec3::NEG_Z } else { Vec3::X };
            SurfaceSample { depth: 1.0, normal }
        }
        fn size(&self) -> (u32, u32) {
            (8, 1)
        }
    }

    #[test]
    fn test_weights_symmetric_and_normalized() {
        for width in [FilterWidth::Narrow, FilterWidth::Wide] {
            let w = width.weights();
            assert_eq!(w.len() % 2, 1);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            for i in 0..w.len() / 2 {
                assert_eq!(w[i], w[w.len() - 1 - i]);
            }
        }
        assert_eq!(FilterWidth::Narrow.weights().len(), 3);
        assert_eq!(FilterWidth::Wide.weights().len(), 5);
    }

    #[test]
    fn test_for_filter() {
        assert_eq!(FilterWidth::for_filter(NoiseFilter::None), None);
        assert_eq!(
            FilterWidth::for_filter(NoiseFilter::Wide),
            Some(FilterWidth::Wide)
        );
    }

    #[test]
    fn test_impulse_spreads_on_flat_geometry() {
        let mut mask = MaskSurface::new(8, 1, 0);
        mask.set(4, 0, 255);
        let center = filter_texel(&mask, &Flat, 4, 0, BlurAxis::Horizontal, FilterWidth::Narrow);
        let side = filter_texel(&mask, &Flat, 3, 0, BlurAxis::Horizontal, FilterWidth::Narrow);
        assert!((center - 0.5).abs() < 1e-6);
        assert!((side - 0.25).abs() < 1e-6);
        // vertical pass over a single row leaves the value alone
        let vertical = filter_texel(&mask, &Flat, 4, 0, BlurAxis::Vertical, FilterWidth::Wide);
        assert!((vertical - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_crease_is_preserved() {
        let mut mask = MaskSurface::new(8, 1, 0);
        for x in 4..8 {
            mask.set(x, 0, 255);
        }
        let left = filter_texel(&mask, &Crease, 3, 0, BlurAxis::Horizontal, FilterWidth::Wide);
        let right = filter_texel(&mask, &Crease, 4, 0, BlurAxis::Horizontal, FilterWidth::Wide);
        assert_eq!(left, 0.0);
        assert_eq!(right, 1.0);
    }

    #[test]
    fn test_normal_similarity() {
        assert_eq!(normal_similarity(Vec3::Z, Vec3::Z), 1.0);
        assert_eq!(normal_similarity(Vec3::Z, Vec3::X), 0.0);
    }

    proptest! {
        #[test]
        fn prop_constant_mask_is_fixed_point(value in 0u8..=255, x in 0u32..8) {
            let mask = MaskSurface::new(8, 1, value);
            let out = filter_texel(&mask, &Flat, x, 0, BlurAxis::Horizontal, FilterWidth::Wide);
            prop_assert!((out - f32::from(value) / 255.0).abs() < 1e-5);
        }
    }
}
