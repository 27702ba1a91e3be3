//! GPU uniform layouts.

use glam::{Mat4, Vec2};
use obscurance_core::reconstruct::normal_rotation;
use obscurance_core::{BlurAxis, FrameSettings, Pass};

/// Per-frame uniforms shared by every obscurance program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct ObscuranceUniforms {
    /// World-to-view rotation for G-buffer normals (forward-Z).
    pub normal_rotation: [[f32; 4]; 4],
    pub proj_scale: [f32; 2],
    pub proj_offset: [f32; 2],
    /// Hardware depth linearization terms.
    pub depth_terms: [f32; 2],
    pub far_plane: f32,
    pub radius: f32,
    pub intensity: f32,
    pub time: f32,
    /// Only read by programs compiled for the dynamic sample tier.
    pub sample_count: u32,
    pub _padding: f32,
}

impl ObscuranceUniforms {
    #[must_use]
    pub fn new(settings: &FrameSettings, world_to_view: Mat4) -> Self {
        let projection = &settings.projection;
        Self {
            normal_rotation: Mat4::from_mat3(normal_rotation(world_to_view)).to_cols_array_2d(),
            proj_scale: projection.scale.to_array(),
            proj_offset: projection.offset.to_array(),
            depth_terms: projection.depth_terms().to_array(),
            far_plane: projection.far,
            radius: settings.radius,
            intensity: settings.intensity,
            time: settings.time,
            sample_count: settings.sample_count,
            _padding: 0.0,
        }
    }
}

/// Per-pass uniforms: render target size and filter direction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassUniforms {
    pub target_size: [f32; 2],
    /// Texel step of blur passes, zero otherwise.
    pub direction: [f32; 2],
}

impl PassUniforms {
    #[must_use]
    pub fn for_pass(pass: &Pass, settings: &FrameSettings) -> Self {
        let target = if pass.writes().is_some() {
            Vec2::new(settings.mask_width as f32, settings.mask_height as f32)
        } else {
            Vec2::new(settings.width as f32, settings.height as f32)
        };
        let direction = match *pass {
            Pass::Blur { axis, .. } | Pass::BlurComposite { axis, .. } => axis_step(axis),
            _ => Vec2::ZERO,
        };
        Self {
            target_size: target.to_array(),
            direction: direction.to_array(),
        }
    }
}

fn axis_step(axis: BlurAxis) -> Vec2 {
    let (dx, dy) = axis.step();
    Vec2::new(dx as f32, dy as f32)
}
