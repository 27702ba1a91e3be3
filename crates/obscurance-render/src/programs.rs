//! Variant table of compiled obscurance pipelines.
//!
//! One pipeline exists per `(ProgramVariant, PassProgram)` pair. Pipelines
//! are compiled on first request; the renderer requests everything a plan
//! needs before it records any pass, so a missing program is reported at
//! setup rather than in the middle of a frame.

use std::collections::HashMap;

use obscurance_core::params::{CONTRAST, FALL_OFF};
use obscurance_core::{
    EstimatorMode, FilterWidth, NormalSource, Pass, PassPlan, ProgramVariant, SampleTier,
};

use crate::error::{RenderError, RenderResult};
use crate::shader::ShaderBuilder;
use crate::sink::OutputSink;

const COMMON_SHADER: &str = include_str!("shaders/common.wgsl");

/// Fragment program of one pass kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassProgram {
    Estimate,
    EstimateComposite,
    /// Estimate multiplied onto the destination in place.
    DirectComposite,
    Blur(FilterWidth),
    Composite,
    BlurComposite(FilterWidth),
}

impl PassProgram {
    /// Program that runs `pass` for the given output sink.
    pub fn for_pass(pass: &Pass, sink: OutputSink) -> Self {
        match *pass {
            Pass::EstimateComposite if sink == OutputSink::DirectComposite => {
                Self::DirectComposite
            }
            Pass::EstimateComposite => Self::EstimateComposite,
            Pass::Estimate { .. } => Self::Estimate,
            Pass::Blur { width, .. } => Self::Blur(width),
            Pass::Composite { .. } => Self::Composite,
            Pass::BlurComposite { width, .. } => Self::BlurComposite(width),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Estimate => "estimate",
            Self::EstimateComposite => "estimate+composite",
            Self::DirectComposite => "direct composite",
            Self::Blur(_) => "blur",
            Self::Composite => "composite",
            Self::BlurComposite(_) => "blur+composite",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::Estimate => include_str!("shaders/estimate.wgsl"),
            Self::EstimateComposite => include_str!("shaders/estimate_composite.wgsl"),
            Self::DirectComposite => include_str!("shaders/direct_composite.wgsl"),
            Self::Blur(_) => include_str!("shaders/blur.wgsl"),
            Self::Composite => include_str!("shaders/composite.wgsl"),
            Self::BlurComposite(_) => include_str!("shaders/blur_composite.wgsl"),
        }
    }

    fn estimates(self) -> bool {
        matches!(
            self,
            Self::Estimate | Self::EstimateComposite | Self::DirectComposite
        )
    }

    fn reads_surface(self) -> bool {
        self != Self::Composite
    }

    fn filter(self) -> Option<FilterWidth> {
        match self {
            Self::Blur(width) | Self::BlurComposite(width) => Some(width),
            _ => None,
        }
    }

    /// Whether the program renders into a scratch mask.
    fn writes_mask(self) -> bool {
        matches!(self, Self::Estimate | Self::Blur(_))
    }
}

/// Key of the variant table.
///
/// Variant fields a program does not read are normalized away, so for
/// example every estimator configuration shares one blur pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub variant: ProgramVariant,
    pub program: PassProgram,
}

impl ProgramKey {
    pub fn new(variant: ProgramVariant, program: PassProgram) -> Self {
        let mut variant = variant;
        if !program.estimates() {
            variant.estimator = EstimatorMode::AngleBased;
            variant.tier = SampleTier::Low8;
            variant.range_check = true;
        }
        if !program.reads_surface() {
            variant.source = NormalSource::DepthNormals;
        }
        Self { variant, program }
    }

    pub fn label(&self) -> String {
        match self.program.filter() {
            Some(width) => format!(
                "obscurance {} {width:?} ({})",
                self.program.name(),
                self.variant.label()
            ),
            None => format!(
                "obscurance {} ({})",
                self.program.name(),
                self.variant.label()
            ),
        }
    }

    /// WGSL for this key: the generated constant header, the shared
    /// declarations and the pass program.
    pub fn shader(&self) -> ShaderBuilder {
        let variant = self.variant;
        let wide = self.program.filter() == Some(FilterWidth::Wide);
        ShaderBuilder::new()
            .with_label(self.label())
            .with_u32("SAMPLE_COUNT", variant.tier.fixed_count().unwrap_or(0))
            .with_bool("RANGE_CHECK", variant.range_check)
            .with_bool(
                "ANGLE_BASED",
                variant.estimator == EstimatorMode::AngleBased,
            )
            .with_bool("GBUFFER_SOURCE", variant.source == NormalSource::GBuffer)
            .with_bool("WIDE_FILTER", wide)
            .with_i32("FILTER_RADIUS", if wide { 2 } else { 1 })
            .with_f32("CONTRAST", CONTRAST)
            .with_f32("FALL_OFF", FALL_OFF)
            .with_source(COMMON_SHADER)
            .with_source(self.program.source())
    }
}

/// Compiled pipelines plus the layouts they share.
pub struct ProgramLibrary {
    frame_layout: wgpu::BindGroupLayout,
    pass_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    target_format: wgpu::TextureFormat,
    pipelines: HashMap<ProgramKey, wgpu::RenderPipeline>,
}

impl ProgramLibrary {
    /// Creates an empty library for destinations of `target_format`.
    #[must_use]
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Obscurance Frame Bind Group Layout"),
            entries: &[
                // Frame uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Packed depth+normals or G-buffer normals
                texture_entry(1, false),
                // G-buffer hardware depth
                texture_entry(2, false),
            ],
        });

        let pass_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Obscurance Pass Bind Group Layout"),
            entries: &[
                // Source color
                texture_entry(0, false),
                // Occlusion mask
                texture_entry(1, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Pass uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Obscurance Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &pass_layout],
            push_constant_ranges: &[],
        });

        Self {
            frame_layout,
            pass_layout,
            pipeline_layout,
            target_format,
            pipelines: HashMap::new(),
        }
    }

    pub fn frame_layout(&self) -> &wgpu::BindGroupLayout {
        &self.frame_layout
    }

    pub fn pass_layout(&self) -> &wgpu::BindGroupLayout {
        &self.pass_layout
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Number of compiled pipelines.
    pub fn compiled_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn get(&self, key: &ProgramKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    /// Compiles the pipeline for `key` unless it already exists.
    pub fn prepare(&mut self, device: &wgpu::Device, key: ProgramKey) -> RenderResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let pipeline = self.compile(device, &key)?;
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Compiles every program `plan` runs with `variant`.
    pub fn prepare_plan(
        &mut self,
        device: &wgpu::Device,
        variant: ProgramVariant,
        plan: &PassPlan,
        sink: OutputSink,
    ) -> RenderResult<()> {
        for pass in plan.passes() {
            let key = ProgramKey::new(variant, PassProgram::for_pass(pass, sink));
            self.prepare(device, key)?;
        }
        Ok(())
    }

    /// Drops every compiled pipeline.
    pub fn clear(&mut self) {
        self.pipelines.clear();
    }

    fn compile(
        &self,
        device: &wgpu::Device,
        key: &ProgramKey,
    ) -> RenderResult<wgpu::RenderPipeline> {
        let label = key.label();
        log::info!("compiling {label}");

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = key.shader().build_module(device)?;
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilationFailed(format!("{label}: {err}")));
        }

        let (format, blend) = if key.program.writes_mask() {
            // Single channel for occlusion
            (wgpu::TextureFormat::R8Unorm, None)
        } else if key.program == PassProgram::DirectComposite {
            (self.target_format, Some(MULTIPLY_BLEND))
        } else {
            (self.target_format, None)
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::PipelineCreationFailed(format!("{label}: {err}")));
        }

        Ok(pipeline)
    }
}

/// `dst.rgb *= src.rgb`, alpha untouched.
const MULTIPLY_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::Src,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscurance_core::{BlurAxis, EffectParameters, NoiseFilter, SampleCount, ScratchId};

    fn variant(params: &EffectParameters, source: NormalSource) -> ProgramVariant {
        ProgramVariant::select(params, source)
    }

    #[test]
    fn test_program_for_pass() {
        let blur = Pass::Blur {
            axis: BlurAxis::Horizontal,
            width: FilterWidth::Wide,
            input: ScratchId(0),
            output: ScratchId(1),
        };
        assert_eq!(
            PassProgram::for_pass(&blur, OutputSink::BlitChain),
            PassProgram::Blur(FilterWidth::Wide)
        );
        assert_eq!(
            PassProgram::for_pass(&Pass::EstimateComposite, OutputSink::BlitChain),
            PassProgram::EstimateComposite
        );
        assert_eq!(
            PassProgram::for_pass(&Pass::EstimateComposite, OutputSink::DirectComposite),
            PassProgram::DirectComposite
        );
    }

    #[test]
    fn test_blur_keys_ignore_estimator_settings() {
        let a = variant(
            &EffectParameters::new().with_estimator(EstimatorMode::DistanceBased),
            NormalSource::DepthNormals,
        );
        let b = variant(
            &EffectParameters::new().with_sample_count(SampleCount::Variable(80)),
            NormalSource::DepthNormals,
        );
        let program = PassProgram::Blur(FilterWidth::Narrow);
        assert_eq!(ProgramKey::new(a, program), ProgramKey::new(b, program));
        assert_ne!(
            ProgramKey::new(a, PassProgram::Estimate),
            ProgramKey::new(b, PassProgram::Estimate)
        );
    }

    #[test]
    fn test_composite_key_ignores_source() {
        let params = EffectParameters::new();
        let a = ProgramKey::new(variant(&params, NormalSource::GBuffer), PassProgram::Composite);
        let b = ProgramKey::new(
            variant(&params, NormalSource::DepthNormals),
            PassProgram::Composite,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_shader_header_reflects_variant() {
        let params = EffectParameters::new()
            .with_estimator(EstimatorMode::DistanceBased)
            .with_sample_count(SampleCount::Variable(24))
            .with_range_check(false);
        let key = ProgramKey::new(variant(&params, NormalSource::GBuffer), PassProgram::Estimate);
        let src = key.shader().combined_source().unwrap();
        assert!(src.contains("const SAMPLE_COUNT: u32 = 24u;"));
        assert!(src.contains("const RANGE_CHECK: bool = false;"));
        assert!(src.contains("const ANGLE_BASED: bool = false;"));
        assert!(src.contains("const GBUFFER_SOURCE: bool = true;"));
        assert!(src.contains("const FALL_OFF: f32 = 100.0;"));
        assert!(src.contains("fn estimate_occlusion"));
        assert!(src.contains("fn fs_main"));
    }

    #[test]
    fn test_dynamic_tier_reads_uniform_count() {
        let params = EffectParameters::new().with_sample_count(SampleCount::Variable(20));
        let key = ProgramKey::new(
            variant(&params, NormalSource::DepthNormals),
            PassProgram::EstimateComposite,
        );
        let src = key.shader().combined_source().unwrap();
        assert!(src.contains("const SAMPLE_COUNT: u32 = 0u;"));
    }

    #[test]
    fn test_wide_blur_header() {
        let params = EffectParameters::new().with_noise_filter(NoiseFilter::Wide);
        let key = ProgramKey::new(
            variant(&params, NormalSource::DepthNormals),
            PassProgram::BlurComposite(FilterWidth::Wide),
        );
        let src = key.shader().combined_source().unwrap();
        assert!(src.contains("const WIDE_FILTER: bool = true;"));
        assert!(src.contains("const FILTER_RADIUS: i32 = 2;"));
        assert!(key.label().contains("Wide"));
    }
}
