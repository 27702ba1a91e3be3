//! Software pass backend.
//!
//! Runs a [`PassPlan`] over in-memory surfaces. Every pass evaluates its
//! output texels independently and only reads surfaces written by earlier
//! passes, so the results match what a GPU backend produces for the same
//! plan up to 8-bit mask quantization.

use std::collections::HashMap;

use crate::composite::composite;
use crate::error::{ObscuranceError, Result};
use crate::estimator::estimate_occlusion;
use crate::filter::filter_texel;
use crate::frame::FrameSettings;
use crate::params::EffectParameters;
use crate::plan::{execute_plan, Pass, PassBackend, PassPlan, ScratchDesc, ScratchId};
use crate::reconstruct::Projection;
use crate::source::DepthNormalSource;
use crate::surface::{quantize_unorm8, texel_center, ColorSurface, MaskSurface};

/// Allocation counters of a [`ScratchPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquisitions.
    pub acquired: usize,
    /// Releases.
    pub released: usize,
    /// Surfaces created because no free one matched.
    pub allocated: usize,
    /// Highest number of simultaneously held surfaces.
    pub peak_live: usize,
}

/// Provider of frame-scoped mask surfaces.
///
/// Released surfaces are kept and handed out again for requests of the same
/// size; contents are cleared on acquisition. Every scratch surface of a
/// frame shares one size, so a request for a new size drops free surfaces
/// of any other size.
#[derive(Debug, Default)]
pub struct ScratchPool {
    free: Vec<MaskSurface>,
    live: HashMap<ScratchId, MaskSurface>,
    stats: PoolStats,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, id: ScratchId, desc: ScratchDesc) -> Result<()> {
        if self.live.contains_key(&id) {
            return Err(ObscuranceError::ScratchInUse(id));
        }
        let size = (desc.width, desc.height);
        self.free.retain(|s| s.size() == size);
        let surface = match self.free.iter().position(|s| s.size() == size) {
            Some(pos) => {
                let mut surface = self.free.swap_remove(pos);
                surface.fill(0);
                surface
            }
            None => {
                self.stats.allocated += 1;
                MaskSurface::new(desc.width, desc.height, 0)
            }
        };
        self.live.insert(id, surface);
        self.stats.acquired += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.live.len());
        Ok(())
    }

    pub fn release(&mut self, id: ScratchId) {
        if let Some(surface) = self.live.remove(&id) {
            self.stats.released += 1;
            self.free.push(surface);
        }
    }

    pub fn get(&self, id: ScratchId) -> Result<&MaskSurface> {
        self.live.get(&id).ok_or(ObscuranceError::UnknownScratch(id))
    }

    /// Number of surfaces currently held.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of released surfaces kept for reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Drops all free surfaces.
    pub fn trim(&mut self) {
        self.free.clear();
    }

    fn take(&mut self, id: ScratchId) -> Result<MaskSurface> {
        self.live.remove(&id).ok_or(ObscuranceError::UnknownScratch(id))
    }

    fn put(&mut self, id: ScratchId, surface: MaskSurface) {
        self.live.insert(id, surface);
    }
}

/// One frame's worth of bound inputs for the software backend.
pub struct CpuFrame<'a, S: ?Sized> {
    color: &'a ColorSurface,
    depth_normals: &'a S,
    destination: &'a mut ColorSurface,
    pool: &'a mut ScratchPool,
    passes_run: usize,
}

impl<'a, S: DepthNormalSource + ?Sized> CpuFrame<'a, S> {
    /// Binds frame inputs. All full-resolution buffers must share one size.
    pub fn new(
        color: &'a ColorSurface,
        depth_normals: &'a S,
        destination: &'a mut ColorSurface,
        pool: &'a mut ScratchPool,
    ) -> Result<Self> {
        color.ensure_not_empty("color")?;
        if destination.size() != color.size() {
            return Err(ObscuranceError::SizeMismatch {
                expected: color.size(),
                actual: destination.size(),
            });
        }
        if depth_normals.size() != color.size() {
            return Err(ObscuranceError::SizeMismatch {
                expected: color.size(),
                actual: depth_normals.size(),
            });
        }
        Ok(Self {
            color,
            depth_normals,
            destination,
            pool,
            passes_run: 0,
        })
    }

    /// Passes executed so far.
    pub fn passes_run(&self) -> usize {
        self.passes_run
    }

    fn estimate_into(&self, mask: &mut MaskSurface, settings: &FrameSettings) {
        let (w, h) = mask.size();
        for (y, row) in mask.rows_mut() {
            for (x, texel) in row.iter_mut().enumerate() {
                let uv = texel_center(x as u32, y, w, h);
                let ao = estimate_occlusion(self.depth_normals, uv, settings);
                *texel = quantize_unorm8(ao);
            }
        }
    }

    fn write_destination(&mut self, mut occlusion_at: impl FnMut(u32, u32) -> f32) {
        let color = self.color;
        for (y, row) in self.destination.rows_mut() {
            for (x, texel) in row.iter_mut().enumerate() {
                let x = x as u32;
                *texel = composite(color.get(x, y), occlusion_at(x, y));
            }
        }
    }
}

impl<S: DepthNormalSource + ?Sized> PassBackend for CpuFrame<'_, S> {
    fn acquire(&mut self, id: ScratchId, desc: ScratchDesc) -> Result<()> {
        self.pool.acquire(id, desc)
    }

    fn release(&mut self, id: ScratchId) {
        self.pool.release(id);
    }

    fn execute(&mut self, pass: &Pass, settings: &FrameSettings) -> Result<()> {
        let (w, h) = self.destination.size();
        match *pass {
            Pass::EstimateComposite => {
                let source = self.depth_normals;
                self.write_destination(|x, y| {
                    estimate_occlusion(source, texel_center(x, y, w, h), settings)
                });
            }
            Pass::Estimate { output } => {
                let mut mask = self.pool.take(output)?;
                self.estimate_into(&mut mask, settings);
                self.pool.put(output, mask);
            }
            Pass::Blur {
                axis,
                width,
                input,
                output,
            } => {
                let mut out = self.pool.take(output)?;
                let result = self.pool.get(input).map(|src| {
                    let (mw, mh) = src.size();
                    for y in 0..mh {
                        for x in 0..mw {
                            let value = filter_texel(src, self.depth_normals, x, y, axis, width);
                            out.store(x, y, value);
                        }
                    }
                });
                self.pool.put(output, out);
                result?;
            }
            Pass::Composite { mask } => {
                let surface = self.pool.take(mask)?;
                self.write_destination(|x, y| surface.sample_bilinear(texel_center(x, y, w, h)));
                self.pool.put(mask, surface);
            }
            Pass::BlurComposite { axis, width, mask } => {
                let surface = self.pool.take(mask)?;
                if surface.size() != (w, h) {
                    let actual = surface.size();
                    self.pool.put(mask, surface);
                    return Err(ObscuranceError::SizeMismatch {
                        expected: (w, h),
                        actual,
                    });
                }
                let source = self.depth_normals;
                self.write_destination(|x, y| filter_texel(&surface, source, x, y, axis, width));
                self.pool.put(mask, surface);
            }
        }
        self.passes_run += 1;
        Ok(())
    }
}

/// Summary of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub passes: usize,
    pub scratch_acquired: usize,
}

/// Software implementation of the obscurance effect.
///
/// Holds the scratch pool across frames; no other state survives a frame.
#[derive(Debug, Default)]
pub struct SoftwareRenderer {
    pool: ScratchPool,
}

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders one frame: `destination = color` darkened by obscurance
    /// estimated from `depth_normals`.
    pub fn render<S: DepthNormalSource + ?Sized>(
        &mut self,
        params: &EffectParameters,
        projection: Projection,
        time: f32,
        color: &ColorSurface,
        depth_normals: &S,
        destination: &mut ColorSurface,
    ) -> Result<FrameReport> {
        let (width, height) = color.size();
        let plan = PassPlan::for_frame(params, width, height);
        let settings = FrameSettings::resolve(
            params,
            projection,
            depth_normals.kind(),
            time,
            width,
            height,
        );

        let acquired_before = self.pool.stats().acquired;
        let mut frame = CpuFrame::new(color, depth_normals, destination, &mut self.pool)?;
        execute_plan(&plan, &settings, &mut frame)?;
        let passes = frame.passes_run();

        Ok(FrameReport {
            passes,
            scratch_acquired: self.pool.stats().acquired - acquired_before,
        })
    }

    pub fn pool(&self) -> &ScratchPool {
        &self.pool
    }
}
