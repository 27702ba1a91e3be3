//! Darkening composite.

use glam::{Vec4, Vec4Swizzles};

/// Darkens `color` by `occlusion`; alpha passes through.
pub fn composite(color: Vec4, occlusion: f32) -> Vec4 {
    (color.xyz() * (1.0 - occlusion)).extend(color.w)
}
