//! wgpu backend for obscurance-rs.
//!
//! This crate runs the passes planned by `obscurance-core` on the GPU:
//! - WGSL programs specialized per variant and compiled into a
//!   [`ProgramLibrary`]
//! - a pool of `R8Unorm` scratch textures ([`TexturePool`])
//! - [`GpuFrame`], the [`obscurance_core::PassBackend`] that records passes
//! - [`ObscuranceRenderer`], the effect handle, writing through an
//!   [`OutputSink`]
//! - headless device creation, upload, readback and image capture helpers

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Texture sizes are converted to f32 for uniforms
#![allow(clippy::cast_precision_loss)]

pub mod backend;
pub mod capture;
pub mod error;
pub mod headless;
pub mod programs;
pub mod readback;
pub mod renderer;
pub mod shader;
pub mod sink;
pub mod texture_pool;
pub mod uniforms;
pub mod upload;

pub use backend::{GpuFrame, PassTargets};
pub use capture::{color_surface_to_rgba8, save_image, save_mask, CaptureError};
pub use error::{RenderError, RenderResult};
pub use headless::HeadlessDevice;
pub use programs::{PassProgram, ProgramKey, ProgramLibrary};
pub use readback::{read_rgba8, read_texture};
pub use renderer::{DepthNormalInput, FrameTargets, ObscuranceRenderer, RendererConfig};
pub use shader::ShaderBuilder;
pub use sink::{OutputSink, RenderPath};
pub use texture_pool::{TexturePool, MASK_FORMAT};
pub use uniforms::{ObscuranceUniforms, PassUniforms};
