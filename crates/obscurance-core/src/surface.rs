//! In-memory 2-D surfaces used by the software backend.

use glam::{Vec2, Vec4};

use crate::error::{ObscuranceError, Result};

/// A row-major 2-D buffer of texels.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

/// RGBA color surface.
pub type ColorSurface = Surface<Vec4>;

/// Single-channel 8-bit occlusion mask.
pub type MaskSurface = Surface<u8>;

/// Packed depth+normal surface (see [`crate::reconstruct::encode_depth_normal`]).
pub type DepthNormalSurface = Surface<Vec4>;

impl<T: Copy> Surface<T> {
    /// Creates a surface filled with `value`.
    pub fn new(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wraps existing row-major data.
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(ObscuranceError::SizeMismatch {
                expected: (width, height),
                actual: (u32::try_from(data.len()).unwrap_or(u32::MAX), 1),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds a surface by evaluating `f` at every texel center UV.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(Vec2) -> T) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(texel_center(x, y, width, height)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Texel under `uv` with clamp-to-edge addressing.
    pub fn sample_nearest(&self, uv: Vec2) -> T {
        let x = (uv.x * self.width as f32).floor();
        let y = (uv.y * self.height as f32).floor();
        self.get(clamp_coord(x, self.width), clamp_coord(y, self.height))
    }

    /// Mutable rows, for per-row evaluation of a pass.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (u32, &mut [T])> {
        let width = self.width.max(1) as usize;
        self.data
            .chunks_mut(width)
            .enumerate()
            .map(|(y, row)| (y as u32, row))
    }

    /// Errors unless both dimensions are non-zero.
    pub fn ensure_not_empty(&self, name: &'static str) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ObscuranceError::EmptySurface(name));
        }
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl MaskSurface {
    /// Occlusion value at a texel as `0..1`.
    pub fn value(&self, x: u32, y: u32) -> f32 {
        f32::from(self.get(x, y)) / 255.0
    }

    /// Stores an occlusion value, quantized to 8 bits.
    pub fn store(&mut self, x: u32, y: u32, value: f32) {
        self.set(x, y, quantize_unorm8(value));
    }

    /// Bilinear sample with clamp-to-edge addressing, as `0..1`.
    pub fn sample_bilinear(&self, uv: Vec2) -> f32 {
        let px = uv.x * self.width as f32 - 0.5;
        let py = uv.y * self.height as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let tx = px - x0;
        let ty = py - y0;

        let fetch = |dx: f32, dy: f32| {
            self.value(
                clamp_coord(x0 + dx, self.width),
                clamp_coord(y0 + dy, self.height),
            )
        };
        let top = fetch(0.0, 0.0) * (1.0 - tx) + fetch(1.0, 0.0) * tx;
        let bottom = fetch(0.0, 1.0) * (1.0 - tx) + fetch(1.0, 1.0) * tx;
        top * (1.0 - ty) + bottom * ty
    }

    /// Largest stored occlusion value.
    pub fn max_value(&self) -> f32 {
        f32::from(self.data.iter().copied().max().unwrap_or(0)) / 255.0
    }
}

/// UV of the center of texel `(x, y)`.
pub fn texel_center(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    Vec2::new(
        (x as f32 + 0.5) / width as f32,
        (y as f32 + 0.5) / height as f32,
    )
}

/// Converts `0..1` to an 8-bit unorm value the way a GPU render target would.
pub fn quantize_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn clamp_coord(c: f32, extent: u32) -> u32 {
    if c <= 0.0 {
        0
    } else {
        (c as u32).min(extent.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_size_check() {
        assert!(Surface::from_vec(2, 2, vec![0u8; 4]).is_ok());
        assert!(matches!(
            Surface::from_vec(2, 2, vec![0u8; 3]),
            Err(ObscuranceError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_nearest_clamps() {
        let s = Surface::from_vec(2, 1, vec![1u8, 2]).unwrap();
        assert_eq!(s.sample_nearest(Vec2::new(-0.5, 0.5)), 1);
        assert_eq!(s.sample_nearest(Vec2::new(0.75, 0.5)), 2);
        assert_eq!(s.sample_nearest(Vec2::new(3.0, 9.0)), 2);
    }

    #[test]
    fn test_mask_bilinear_midpoint() {
        let s = MaskSurface::from_vec(2, 1, vec![0, 255]).unwrap();
        let mid = s.sample_bilinear(Vec2::new(0.5, 0.5));
        assert!((mid - 0.5).abs() < 1e-6);
        // texel centers return the texel itself
        assert_eq!(s.sample_bilinear(Vec2::new(0.75, 0.5)), 1.0);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize_unorm8(-1.0), 0);
        assert_eq!(quantize_unorm8(0.5), 128);
        assert_eq!(quantize_unorm8(2.0), 255);
    }

    #[test]
    fn test_from_fn_uses_texel_centers() {
        let s = Surface::from_fn(4, 2, |uv| uv);
        assert_eq!(s.get(0, 0), Vec2::new(0.125, 0.25));
        assert_eq!(s.get(3, 1), Vec2::new(0.875, 0.75));
    }
}
