//! Copying textures back to the CPU.

use crate::error::{RenderError, RenderResult};

/// Bytes per row padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn aligned_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unaligned = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Reads a whole texture, returning tightly packed rows.
///
/// The texture needs `COPY_SRC` usage and a color format with a fixed
/// texel size.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> RenderResult<Vec<u8>> {
    let format = texture.format();
    let bytes_per_pixel = format
        .block_copy_size(None)
        .ok_or(RenderError::UnsupportedFormat(format))?;
    let width = texture.width();
    let height = texture.height();
    let bytes_per_row = aligned_bytes_per_row(width, bytes_per_pixel);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("obscurance readback buffer"),
        size: u64::from(bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("obscurance readback encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv()
        .map_err(|_| RenderError::BufferMapFailed)?
        .map_err(|_| RenderError::BufferMapFailed)?;

    // Copy data, removing row padding
    let data = buffer_slice.get_mapped_range();
    let row_bytes = (width * bytes_per_pixel) as usize;
    let mut result = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height {
        let start = (row * bytes_per_row) as usize;
        result.extend_from_slice(&data[start..start + row_bytes]);
    }

    drop(data);
    buffer.unmap();

    Ok(result)
}

/// Reads an 8-bit color texture as RGBA8, swizzling BGRA formats.
pub fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> RenderResult<Vec<u8>> {
    let format = texture.format();
    let swap = match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
        other => return Err(RenderError::UnsupportedFormat(other)),
    };
    let mut data = read_texture(device, queue, texture)?;
    if swap {
        for chunk in data.chunks_exact_mut(4) {
            chunk.swap(0, 2);
        }
    }
    Ok(data)
}
