//! The effect handle.
//!
//! [`ObscuranceRenderer::acquire`] compiles the programs the initial
//! configuration needs and returns a ready instance; [`ObscuranceRenderer::release`]
//! frees its pipelines and pooled textures. Nothing is global: hosts may
//! hold several renderers on one device.

use glam::Mat4;
use obscurance_core::{
    execute_plan, EffectParameters, FrameReport, FrameSettings, NormalSource, ProgramVariant,
    Projection,
};
use wgpu::util::DeviceExt;

use crate::backend::{GpuFrame, PassTargets};
use crate::error::{RenderError, RenderResult};
use crate::programs::ProgramLibrary;
use crate::sink::{OutputSink, RenderPath};
use crate::texture_pool::{TexturePool, MASK_FORMAT};
use crate::uniforms::ObscuranceUniforms;
use crate::upload::GBUFFER_DEPTH_FORMAT;
use crate::upload::check_target_format;

/// Setup-time configuration reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    /// Format of the destination color target.
    pub target_format: wgpu::TextureFormat,
    pub render_path: RenderPath,
    /// Whether the host lets the effect draw straight into its color target.
    pub supports_direct_composite: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            target_format: wgpu::TextureFormat::Rgba8Unorm,
            render_path: RenderPath::Forward,
            supports_direct_composite: false,
        }
    }
}

/// Depth and normal inputs of one frame.
#[derive(Clone, Copy)]
pub enum DepthNormalInput<'a> {
    /// Packed depth+normal texture.
    Packed(&'a wgpu::TextureView),
    /// G-buffer normal channel and hardware depth.
    GBuffer {
        normals: &'a wgpu::TextureView,
        /// Hardware depth copied into a [`GBUFFER_DEPTH_FORMAT`] texture;
        /// `Depth32Float` views cannot be bound here.
        depth: &'a wgpu::TextureView,
        world_to_view: Mat4,
    },
}

impl DepthNormalInput<'_> {
    pub fn kind(&self) -> NormalSource {
        match self {
            Self::Packed(_) => NormalSource::DepthNormals,
            Self::GBuffer { .. } => NormalSource::GBuffer,
        }
    }
}

/// Color targets of one frame.
#[derive(Clone, Copy)]
pub struct FrameTargets<'a> {
    /// Source color; required by the blit chain, ignored by direct composite.
    pub source: Option<&'a wgpu::TextureView>,
    pub destination: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// GPU obscurance effect.
pub struct ObscuranceRenderer {
    config: RendererConfig,
    sink: OutputSink,
    library: ProgramLibrary,
    pool: TexturePool,
    sampler: wgpu::Sampler,
    placeholder_color: wgpu::TextureView,
    placeholder_mask: wgpu::TextureView,
    placeholder_depth: wgpu::TextureView,
}

impl ObscuranceRenderer {
    /// Creates the effect and compiles the programs `params` needs at the
    /// given frame size.
    ///
    /// Unsupported formats and programs that fail to compile are reported
    /// here rather than per frame.
    pub fn acquire(
        device: &wgpu::Device,
        config: RendererConfig,
        params: &EffectParameters,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        check_target_format(config.target_format)?;
        let sink = OutputSink::select(config.render_path, config.supports_direct_composite);
        log::info!("acquiring obscurance renderer ({sink:?}, {:?})", config.target_format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Obscurance Mask Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let mut renderer = Self {
            config,
            sink,
            library: ProgramLibrary::new(device, config.target_format),
            pool: TexturePool::new(),
            sampler,
            placeholder_color: placeholder(device, wgpu::TextureFormat::Rgba8Unorm),
            placeholder_mask: placeholder(device, MASK_FORMAT),
            placeholder_depth: placeholder(device, GBUFFER_DEPTH_FORMAT),
        };

        let source = sink.required_source().unwrap_or(NormalSource::DepthNormals);
        let variant = ProgramVariant::select(params, source);
        let plan = sink.plan(params, width, height);
        renderer.library.prepare_plan(device, variant, &plan, sink)?;

        Ok(renderer)
    }

    /// Frees every pipeline and pooled texture.
    pub fn release(mut self) {
        log::info!(
            "releasing obscurance renderer ({} programs, {} scratch textures created)",
            self.library.compiled_count(),
            self.pool.created_count()
        );
        self.library.clear();
        self.pool.trim();
    }

    pub fn config(&self) -> RendererConfig {
        self.config
    }

    pub fn sink(&self) -> OutputSink {
        self.sink
    }

    pub fn library(&self) -> &ProgramLibrary {
        &self.library
    }

    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    /// Records and submits one frame.
    ///
    /// Programs for a configuration not seen before are compiled first;
    /// nothing is recorded if that fails.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: &EffectParameters,
        projection: Projection,
        time: f32,
        inputs: DepthNormalInput<'_>,
        targets: FrameTargets<'_>,
    ) -> RenderResult<FrameReport> {
        let source = match (self.sink, targets.source) {
            (OutputSink::DirectComposite, _) => {
                if inputs.kind() != NormalSource::GBuffer {
                    return Err(RenderError::DirectCompositeNeedsGBuffer);
                }
                &self.placeholder_color
            }
            (OutputSink::BlitChain, Some(source)) => source,
            (OutputSink::BlitChain, None) => return Err(RenderError::MissingSourceColor),
        };

        let (width, height) = (targets.width, targets.height);
        let settings =
            FrameSettings::resolve(params, projection, inputs.kind(), time, width, height);
        let plan = self.sink.plan(params, width, height);
        self.library
            .prepare_plan(device, settings.variant, &plan, self.sink)?;

        let (normal_view, depth_view, world_to_view) = match inputs {
            DepthNormalInput::Packed(view) => (view, &self.placeholder_depth, Mat4::IDENTITY),
            DepthNormalInput::GBuffer {
                normals,
                depth,
                world_to_view,
            } => (normals, depth, world_to_view),
        };

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Obscurance Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ObscuranceUniforms::new(&settings, world_to_view)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Obscurance Frame Bind Group"),
            layout: self.library.frame_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("obscurance encoder"),
        });

        let acquired_before = self.pool.acquired_count();
        let mut frame = GpuFrame::new(
            device,
            &mut encoder,
            &self.library,
            &mut self.pool,
            &frame_bind_group,
            PassTargets {
                source,
                destination: targets.destination,
                placeholder_mask: &self.placeholder_mask,
                sampler: &self.sampler,
            },
            self.sink,
        );
        execute_plan(&plan, &settings, &mut frame)?;
        let passes = frame.passes_recorded();

        queue.submit(std::iter::once(encoder.finish()));

        Ok(FrameReport {
            passes,
            scratch_acquired: self.pool.acquired_count() - acquired_before,
        })
    }
}

/// 1x1 texture bound where a program declares a resource it does not read.
fn placeholder(device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Obscurance Placeholder Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}
