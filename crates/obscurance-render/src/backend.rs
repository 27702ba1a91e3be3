//! GPU pass backend: records plan passes into a command encoder.

use obscurance_core::{
    FrameSettings, ObscuranceError, Pass, PassBackend, Result, ScratchDesc, ScratchId,
};
use wgpu::util::DeviceExt;

use crate::programs::{PassProgram, ProgramKey, ProgramLibrary};
use crate::sink::OutputSink;
use crate::texture_pool::TexturePool;
use crate::uniforms::PassUniforms;

/// Views bound into every pass of one frame.
pub struct PassTargets<'a> {
    /// Source color; for direct composite any placeholder view.
    pub source: &'a wgpu::TextureView,
    pub destination: &'a wgpu::TextureView,
    /// Bound when a pass reads no mask.
    pub placeholder_mask: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

/// One frame of GPU work.
///
/// Passes are only recorded; nothing runs until the caller submits the
/// encoder.
pub struct GpuFrame<'a> {
    device: &'a wgpu::Device,
    encoder: &'a mut wgpu::CommandEncoder,
    library: &'a ProgramLibrary,
    pool: &'a mut TexturePool,
    frame_bind_group: &'a wgpu::BindGroup,
    targets: PassTargets<'a>,
    sink: OutputSink,
    passes_recorded: usize,
}

impl<'a> GpuFrame<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        encoder: &'a mut wgpu::CommandEncoder,
        library: &'a ProgramLibrary,
        pool: &'a mut TexturePool,
        frame_bind_group: &'a wgpu::BindGroup,
        targets: PassTargets<'a>,
        sink: OutputSink,
    ) -> Self {
        Self {
            device,
            encoder,
            library,
            pool,
            frame_bind_group,
            targets,
            sink,
            passes_recorded: 0,
        }
    }

    pub fn passes_recorded(&self) -> usize {
        self.passes_recorded
    }
}

impl PassBackend for GpuFrame<'_> {
    fn acquire(&mut self, id: ScratchId, desc: ScratchDesc) -> Result<()> {
        self.pool.acquire(self.device, id, desc)
    }

    fn release(&mut self, id: ScratchId) {
        self.pool.release(id);
    }

    fn execute(&mut self, pass: &Pass, settings: &FrameSettings) -> Result<()> {
        let program = PassProgram::for_pass(pass, self.sink);
        let key = ProgramKey::new(settings.variant, program);
        let pipeline = self.library.get(&key).ok_or_else(|| {
            ObscuranceError::InvalidPlan(format!("{} was not prepared", key.label()))
        })?;

        let pool = &*self.pool;
        let target = match pass.writes() {
            Some(id) => pool.get(id)?.view(),
            None => self.targets.destination,
        };
        let mask = match pass.reads() {
            Some(id) => pool.get(id)?.view(),
            None => self.targets.placeholder_mask,
        };

        let uniforms = PassUniforms::for_pass(pass, settings);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Obscurance Pass Uniform Buffer"),
                contents: bytemuck::cast_slice(&[uniforms]),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Obscurance Pass Bind Group"),
            layout: self.library.pass_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(self.targets.source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(mask),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(self.targets.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        // direct composite multiplies onto what the host already rendered
        let load = if program == PassProgram::DirectComposite {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::WHITE)
        };

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.name()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, self.frame_bind_group, &[]);
        render_pass.set_bind_group(1, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        drop(render_pass);

        self.passes_recorded += 1;
        Ok(())
    }
}
