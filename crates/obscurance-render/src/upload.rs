//! Uploading CPU surfaces as input textures.

use obscurance_core::surface::quantize_unorm8;
use obscurance_core::{ColorSurface, DepthNormalSurface, Surface};

use crate::error::{RenderError, RenderResult};

/// Formats accepted for the destination color target.
pub const SUPPORTED_TARGET_FORMATS: [wgpu::TextureFormat; 5] = [
    wgpu::TextureFormat::Rgba8Unorm,
    wgpu::TextureFormat::Rgba8UnormSrgb,
    wgpu::TextureFormat::Bgra8Unorm,
    wgpu::TextureFormat::Bgra8UnormSrgb,
    wgpu::TextureFormat::Rgba16Float,
];

/// Format of the G-buffer depth channel.
///
/// The frame layout samples depth as a float texture, so a host holding
/// `Depth32Float` copies it into a texture of this format first.
pub const GBUFFER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Errors unless `format` can be bound as G-buffer depth.
pub fn check_gbuffer_depth_format(format: wgpu::TextureFormat) -> RenderResult<()> {
    if format == GBUFFER_DEPTH_FORMAT {
        Ok(())
    } else {
        Err(RenderError::UnsupportedFormat(format))
    }
}

/// Errors unless `format` can be a destination.
pub fn check_target_format(format: wgpu::TextureFormat) -> RenderResult<()> {
    if SUPPORTED_TARGET_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(RenderError::UnsupportedFormat(format))
    }
}

/// Creates a texture and fills it from `data`.
fn create_filled(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    size: (u32, u32),
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    data: &[u8],
) -> wgpu::Texture {
    let (width, height) = size;
    let extent = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: usage | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let bytes_per_pixel = format.block_copy_size(None).unwrap_or(4);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        extent,
    );
    texture
}

/// RGBA8 color texture usable as the blit chain source.
pub fn color_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &ColorSurface,
) -> wgpu::Texture {
    let data: Vec<u8> = surface
        .data()
        .iter()
        .flat_map(|c| c.to_array().map(quantize_unorm8))
        .collect();
    create_filled(
        device,
        queue,
        "obscurance source color",
        surface.size(),
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureUsages::TEXTURE_BINDING,
        &data,
    )
}

/// Destination texture with the usages the renderer and readback need.
///
/// `initial` fills it first, which direct composite darkens in place.
pub fn target_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    initial: &ColorSurface,
) -> wgpu::Texture {
    let data: Vec<u8> = initial
        .data()
        .iter()
        .flat_map(|c| c.to_array().map(quantize_unorm8))
        .collect();
    create_filled(
        device,
        queue,
        "obscurance destination",
        initial.size(),
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        &data,
    )
}

/// Packed depth+normal texture at full float precision. Also used for
/// G-buffer normal surfaces, which share the layout.
pub fn depth_normal_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &DepthNormalSurface,
) -> wgpu::Texture {
    let floats: Vec<f32> = surface.data().iter().flat_map(|v| v.to_array()).collect();
    create_filled(
        device,
        queue,
        "obscurance depth normals",
        surface.size(),
        wgpu::TextureFormat::Rgba32Float,
        wgpu::TextureUsages::TEXTURE_BINDING,
        bytemuck::cast_slice(&floats),
    )
}

/// Single-channel float texture in [`GBUFFER_DEPTH_FORMAT`], used for
/// G-buffer hardware depth.
pub fn depth_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &Surface<f32>,
) -> wgpu::Texture {
    create_filled(
        device,
        queue,
        "obscurance hardware depth",
        surface.size(),
        GBUFFER_DEPTH_FORMAT,
        wgpu::TextureUsages::TEXTURE_BINDING,
        bytemuck::cast_slice(surface.data()),
    )
}
