//! Frame-scoped `R8Unorm` scratch textures.

use std::collections::HashMap;

use obscurance_core::{ObscuranceError, Result, ScratchDesc, ScratchId};

/// Format of every scratch mask.
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// A pooled render target and its view.
pub struct PooledTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: ScratchDesc,
}

impl PooledTexture {
    fn new(device: &wgpu::Device, desc: ScratchDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Obscurance Scratch Texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: MASK_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            desc,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Recycles scratch textures across frames.
///
/// A texture is held under a [`ScratchId`] between `acquire` and `release`.
/// Released textures go back to a free list and are handed out again for
/// requests of the same size. Every pass that writes a mask clears it, so
/// contents are not reset here.
#[derive(Default)]
pub struct TexturePool {
    free: Vec<PooledTexture>,
    live: HashMap<ScratchId, PooledTexture>,
    created: usize,
    acquired: usize,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        id: ScratchId,
        desc: ScratchDesc,
    ) -> Result<()> {
        if self.live.contains_key(&id) {
            return Err(ObscuranceError::ScratchInUse(id));
        }
        // every scratch texture of a frame shares one size; others are stale
        let (keep, stale): (Vec<_>, Vec<_>) =
            self.free.drain(..).partition(|t| t.desc == desc);
        self.free = keep;
        for texture in stale {
            log::debug!(
                "dropping stale {}x{} scratch texture",
                texture.desc.width,
                texture.desc.height
            );
            texture.texture.destroy();
        }

        let texture = match self.free.iter().position(|t| t.desc == desc) {
            Some(pos) => self.free.swap_remove(pos),
            None => {
                log::debug!("creating {}x{} scratch texture", desc.width, desc.height);
                self.created += 1;
                PooledTexture::new(device, desc)
            }
        };
        self.live.insert(id, texture);
        self.acquired += 1;
        Ok(())
    }

    pub fn release(&mut self, id: ScratchId) {
        if let Some(texture) = self.live.remove(&id) {
            self.free.push(texture);
        }
    }

    pub fn get(&self, id: ScratchId) -> Result<&PooledTexture> {
        self.live.get(&id).ok_or(ObscuranceError::UnknownScratch(id))
    }

    /// Textures currently held.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Released textures kept for reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Textures ever created by this pool.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Successful acquisitions so far.
    pub fn acquired_count(&self) -> usize {
        self.acquired
    }

    /// Destroys every free texture.
    pub fn trim(&mut self) {
        for texture in self.free.drain(..) {
            texture.texture.destroy();
        }
    }
}
