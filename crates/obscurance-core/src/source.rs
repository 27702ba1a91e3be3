//! Where the estimator reads depth and normals from.
//!
//! Forward rendering provides a dedicated packed depth+normal buffer; the
//! deferred path reads the G-buffer normal channel and the hardware depth
//! buffer instead. Both feed the same estimator through [`DepthNormalSource`].

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::error::{ObscuranceError, Result};
use crate::reconstruct::{decode_depth_normal, normal_rotation, Projection};
use crate::surface::{DepthNormalSurface, Surface};
use crate::variant::NormalSource;

/// Linear depth and view-space normal at a screen position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub depth: f32,
    pub normal: Vec3,
}

/// Read access to per-pixel depth and normal.
pub trait DepthNormalSource {
    /// Samples linear view depth and view-space normal at `uv`.
    fn sample(&self, uv: Vec2) -> SurfaceSample;

    /// Native resolution of the source.
    fn size(&self) -> (u32, u32);

    /// Program variant family this source corresponds to.
    fn kind(&self) -> NormalSource {
        NormalSource::DepthNormals
    }
}

/// Dedicated depth+normal buffer in the packed stereographic encoding.
#[derive(Debug, Clone, Copy)]
pub struct PackedDepthNormals<'a> {
    surface: &'a DepthNormalSurface,
    far: f32,
}

impl<'a> PackedDepthNormals<'a> {
    /// `far` scales the stored 0..1 depth to view units.
    pub fn new(surface: &'a DepthNormalSurface, far: f32) -> Self {
        Self { surface, far }
    }
}

impl DepthNormalSource for PackedDepthNormals<'_> {
    fn sample(&self, uv: Vec2) -> SurfaceSample {
        let (depth01, normal) = decode_depth_normal(self.surface.sample_nearest(uv));
        SurfaceSample {
            depth: depth01 * self.far,
            normal,
        }
    }

    fn size(&self) -> (u32, u32) {
        self.surface.size()
    }
}

/// G-buffer sourced depth and normals for the deferred path.
///
/// Normals are stored in world space remapped to `0..1`; depth is the raw
/// hardware depth value.
#[derive(Debug, Clone, Copy)]
pub struct GBufferDepthNormals<'a> {
    normals: &'a Surface<Vec4>,
    depth: &'a Surface<f32>,
    rotation: Mat3,
    projection: Projection,
}

impl<'a> GBufferDepthNormals<'a> {
    /// Binds the G-buffer channels; both must be non-empty and the same size.
    pub fn new(
        normals: &'a Surface<Vec4>,
        depth: &'a Surface<f32>,
        world_to_view: Mat4,
        projection: Projection,
    ) -> Result<Self> {
        normals.ensure_not_empty("gbuffer normals")?;
        depth.ensure_not_empty("gbuffer depth")?;
        if normals.size() != depth.size() {
            return Err(ObscuranceError::SizeMismatch {
                expected: depth.size(),
                actual: normals.size(),
            });
        }
        Ok(Self {
            normals,
            depth,
            rotation: normal_rotation(world_to_view),
            projection,
        })
    }
}

impl DepthNormalSource for GBufferDepthNormals<'_> {
    fn sample(&self, uv: Vec2) -> SurfaceSample {
        let world = self.normals.sample_nearest(uv).xyz() * 2.0 - Vec3::ONE;
        let normal = self.rotation * world;
        let depth = self.projection.linearize_depth(self.depth.sample_nearest(uv));
        SurfaceSample { depth, normal }
    }

    fn size(&self) -> (u32, u32) {
        self.depth.size()
    }

    fn kind(&self) -> NormalSource {
        NormalSource::GBuffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::encode_depth_normal;

    #[test]
    fn test_packed_source_scales_depth() {
        let surface = Surface::new(4, 4, encode_depth_normal(Vec3::NEG_Z, 0.25));
        let source = PackedDepthNormals::new(&surface, 40.0);
        let s = source.sample(Vec2::splat(0.5));
        assert!((s.depth - 10.0).abs() < 1e-3);
        assert_eq!(s.normal, Vec3::NEG_Z);
        assert_eq!(source.size(), (4, 4));
    }

    #[test]
    fn test_gbuffer_source_matches_packed() {
        let projection = Projection::perspective(1.0, 1.0, 0.1, 100.0);
        // camera looking down -Z: a world normal of +Z faces the camera
        let normals = Surface::new(2, 2, Vec4::new(0.5, 0.5, 1.0, 1.0));
        let depth = Surface::new(2, 2, projection.hardware_depth(8.0));
        let source =
            GBufferDepthNormals::new(&normals, &depth, Mat4::IDENTITY, projection).unwrap();

        let s = source.sample(Vec2::splat(0.25));
        assert!((s.depth - 8.0).abs() < 1e-3);
        assert!((s.normal - Vec3::NEG_Z).length() < 1e-6);
        assert_eq!(source.kind(), NormalSource::GBuffer);
    }

    #[test]
    fn test_gbuffer_channels_are_validated() {
        let projection = Projection::perspective(1.0, 1.0, 0.1, 100.0);
        let normals = Surface::new(8, 8, Vec4::new(0.5, 0.5, 1.0, 1.0));
        let depth = Surface::new(8, 8, 0.5);
        let empty = Surface::new(0, 0, Vec4::ZERO);
        let small = Surface::new(4, 8, Vec4::ZERO);

        assert_eq!(
            GBufferDepthNormals::new(&empty, &depth, Mat4::IDENTITY, projection).err(),
            Some(ObscuranceError::EmptySurface("gbuffer normals"))
        );
        assert_eq!(
            GBufferDepthNormals::new(&small, &depth, Mat4::IDENTITY, projection).err(),
            Some(ObscuranceError::SizeMismatch {
                expected: (8, 8),
                actual: (4, 8),
            })
        );
        assert!(GBufferDepthNormals::new(&normals, &depth, Mat4::IDENTITY, projection).is_ok());
    }
}
