//! View-space reconstruction from screen coordinates and stored depth.
//!
//! View space here is left-handed with `+Z` pointing away from the camera,
//! so a stored linear depth is directly the view-space `z`. Normals facing
//! the camera have a negative `z`.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec3Swizzles, Vec4};

/// Stereographic scale used by the packed normal encoding.
const STEREO_SCALE: f32 = 1.7777;

/// Below this cross product length the primary reference axis is rejected.
const PARALLEL_EPSILON: f32 = 1e-4;

/// Projection terms needed to go between view space and screen UV.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Diagonal terms `(P11, P22)`.
    pub scale: Vec2,
    /// Off-axis terms `(P13, P23)` in forward-Z convention.
    pub offset: Vec2,
    /// Far clip distance; scales packed 0..1 depth to view units.
    pub far: f32,
    /// Hardware depth linearization terms `(P33, P34)` of the source matrix.
    depth_terms: Vec2,
}

impl Projection {
    /// Builds projection terms from a right-handed glam projection matrix
    /// (camera looking down `-Z`, depth range `0..1`).
    #[must_use]
    pub fn from_matrix(proj: Mat4, far: f32) -> Self {
        Self {
            scale: Vec2::new(proj.x_axis.x, proj.y_axis.y),
            // forward-Z view space flips the sign of the z column
            offset: Vec2::new(-proj.z_axis.x, -proj.z_axis.y),
            far,
            depth_terms: Vec2::new(proj.z_axis.z, proj.w_axis.z),
        }
    }

    /// Symmetric perspective projection, mostly useful for tests and demos.
    #[must_use]
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::from_matrix(Mat4::perspective_rh(fov_y, aspect, near, far), far)
    }

    /// `(P33, P34)` of the source matrix, for linearizing depth on the GPU.
    #[must_use]
    pub fn depth_terms(&self) -> Vec2 {
        self.depth_terms
    }

    /// Reconstructs the view-space position of a surface point.
    ///
    /// `pos = ((uv * 2 - 1 - offset) / scale, 1) * depth`
    #[must_use]
    pub fn view_position(&self, uv: Vec2, depth: f32) -> Vec3 {
        let xy = (uv * 2.0 - Vec2::ONE - self.offset) / self.scale;
        xy.extend(1.0) * depth
    }

    /// Projects a view-space position back to screen UV.
    ///
    /// `uv = (proj * pos).xy / pos.z * 0.5 + 0.5`
    #[must_use]
    pub fn project_to_uv(&self, pos: Vec3) -> Vec2 {
        let clip = Vec2::new(
            self.scale.x * pos.x + self.offset.x * pos.z,
            self.scale.y * pos.y + self.offset.y * pos.z,
        );
        clip / pos.z * 0.5 + Vec2::splat(0.5)
    }

    /// Converts a hardware depth value (`0..1`) to linear view depth.
    #[must_use]
    pub fn linearize_depth(&self, raw: f32) -> f32 {
        self.depth_terms.y / (raw + self.depth_terms.x)
    }

    /// Hardware depth value a point at `depth` would be stored with.
    #[must_use]
    pub fn hardware_depth(&self, depth: f32) -> f32 {
        self.depth_terms.y / depth - self.depth_terms.x
    }
}

/// Orthonormal frame around a surface normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentFrame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

impl TangentFrame {
    /// Builds a frame from a unit normal.
    ///
    /// The tangent is `cross(+X, n)`; when the normal is (nearly) parallel to
    /// `+X` the reference switches to `+Y`. Degenerate normals produce a
    /// degenerate frame rather than an error.
    #[must_use]
    pub fn from_normal(normal: Vec3) -> Self {
        let mut tangent = Vec3::X.cross(normal);
        if tangent.length_squared() < PARALLEL_EPSILON * PARALLEL_EPSILON {
            tangent = Vec3::Y.cross(normal);
        }
        let tangent = tangent.normalize_or_zero();
        let bitangent = normal.cross(tangent);
        Self {
            tangent,
            bitangent,
            normal,
        }
    }

    /// Rotates a local-hemisphere vector into view space.
    #[must_use]
    pub fn to_view(&self, local: Vec3) -> Vec3 {
        self.tangent * local.x + self.bitangent * local.y + self.normal * local.z
    }
}

/// Packs a view-space normal and a 0..1 linear depth into four channels.
///
/// Channels `rg` hold a stereographic projection of the normal, `ba` the
/// depth split into two 8-bit fractions. `normal` is in forward-Z view space.
#[must_use]
pub fn encode_depth_normal(normal: Vec3, depth01: f32) -> Vec4 {
    // stored normals use the camera-facing +Z convention
    let n = Vec3::new(normal.x, normal.y, -normal.z);
    let enc = n.xy() / (n.z + 1.0) / STEREO_SCALE * 0.5 + Vec2::splat(0.5);

    let depth01 = depth01.clamp(0.0, 1.0);
    let hi = fract(depth01);
    let lo = fract(depth01 * 255.0);
    let hi = hi - lo / 255.0;
    // depth01 == 1.0 wraps to zero under fract; keep it saturated instead
    let (hi, lo) = if depth01 >= 1.0 { (1.0, 0.0) } else { (hi, lo) };

    Vec4::new(enc.x, enc.y, hi, lo)
}

/// Decodes a packed texel into `(linear 0..1 depth, view-space normal)`.
#[must_use]
pub fn decode_depth_normal(texel: Vec4) -> (f32, Vec3) {
    let nn = Vec3::new(
        texel.x * 2.0 * STEREO_SCALE - STEREO_SCALE,
        texel.y * 2.0 * STEREO_SCALE - STEREO_SCALE,
        1.0,
    );
    let g = 2.0 / nn.dot(nn);
    let normal = Vec3::new(g * nn.x, g * nn.y, -(g - 1.0));
    let depth01 = texel.z + texel.w / 255.0;
    (depth01, normal)
}

/// World-to-view rotation for G-buffer normals, in forward-Z convention.
#[must_use]
pub fn normal_rotation(world_to_view: Mat4) -> Mat3 {
    let flip = Mat3::from_diagonal(Vec3::new(1.0, 1.0, -1.0));
    flip * Mat3::from_mat4(world_to_view)
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    fn assert_vec3_near(a: Vec3, b: Vec3, eps: f32) {
        assert!((a - b).length() < eps, "{a:?} != {b:?}");
    }

    #[test]
    fn test_view_position_round_trip() {
        let proj = Projection::perspective(1.0, 1.5, 0.1, 50.0);
        for &(u, v, d) in &[(0.5, 0.5, 2.0), (0.1, 0.9, 7.5), (0.8, 0.3, 30.0)] {
            let uv = Vec2::new(u, v);
            let pos = proj.view_position(uv, d);
            assert!((pos.z - d).abs() < 1e-5);
            let back = proj.project_to_uv(pos);
            assert!((back - uv).length() < 1e-5, "{back:?} != {uv:?}");
        }
    }

    #[test]
    fn test_off_axis_projection_round_trip() {
        let mut m = Mat4::perspective_rh(1.1, 1.3, 0.5, 80.0);
        m.z_axis.x = 0.25;
        m.z_axis.y = -0.1;
        let proj = Projection::from_matrix(m, 80.0);
        let pos = Vec3::new(0.7, -0.2, 4.0);
        let uv = proj.project_to_uv(pos);
        assert_vec3_near(proj.view_position(uv, pos.z), pos, 1e-4);

        // agrees with the full matrix on a camera looking down -Z
        let clip = m * Vec4::new(pos.x, pos.y, -pos.z, 1.0);
        let ndc = clip.xy() / clip.w;
        assert!((ndc * 0.5 + Vec2::splat(0.5) - uv).length() < 1e-5);
    }

    #[test]
    fn test_linearize_depth() {
        let proj = Projection::perspective(1.0, 1.0, 0.1, 100.0);
        for d in [0.2, 1.0, 12.5, 99.0] {
            let raw = proj.hardware_depth(d);
            assert!((0.0..=1.0).contains(&raw));
            assert!((proj.linearize_depth(raw) - d).abs() / d < 1e-4);
        }
    }

    #[test]
    fn test_tangent_frame_orthonormal() {
        for n in [
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.3, 0.8, -0.2).normalize(),
            Vec3::Y,
        ] {
            let f = TangentFrame::from_normal(n);
            assert!((f.tangent.length() - 1.0).abs() < 1e-5);
            assert!((f.bitangent.length() - 1.0).abs() < 1e-5);
            assert!(f.tangent.dot(n).abs() < 1e-5);
            assert!(f.bitangent.dot(n).abs() < 1e-5);
            assert!(f.tangent.dot(f.bitangent).abs() < 1e-5);
        }
    }

    #[test]
    fn test_tangent_frame_fallback_axis() {
        let f = TangentFrame::from_normal(Vec3::X);
        assert!((f.tangent.length() - 1.0).abs() < 1e-5);
        assert!(f.tangent.dot(Vec3::X).abs() < 1e-5);
        let f = TangentFrame::from_normal(Vec3::NEG_X);
        assert!((f.tangent.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_local_z_maps_to_normal() {
        let n = Vec3::new(-0.4, 0.1, -0.9).normalize();
        let f = TangentFrame::from_normal(n);
        assert_vec3_near(f.to_view(Vec3::Z), n, 1e-6);
    }

    #[test]
    fn test_depth_normal_codec() {
        let normal = Vec3::new(0.2, -0.5, -0.8).normalize();
        let texel = encode_depth_normal(normal, 0.3137);
        let (depth, decoded) = decode_depth_normal(texel);
        assert!((depth - 0.3137).abs() < 1e-4);
        assert_vec3_near(decoded, normal, 1e-4);
    }

    #[test]
    fn test_camera_facing_normal_decodes_exactly() {
        let texel = encode_depth_normal(Vec3::NEG_Z, 0.05);
        let (_, n) = decode_depth_normal(texel);
        assert_eq!(n, Vec3::NEG_Z);
    }

    #[test]
    fn test_normal_rotation_flips_z() {
        let r = normal_rotation(Mat4::IDENTITY);
        assert_vec3_near(r * Vec3::Z, Vec3::NEG_Z, 1e-6);
        assert_vec3_near(r * Vec3::X, Vec3::X, 1e-6);
    }
}
