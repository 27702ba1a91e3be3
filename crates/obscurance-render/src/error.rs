//! Rendering error types.

use obscurance_core::ObscuranceError;
use thiserror::Error;

use crate::capture::CaptureError;

/// Errors that can occur while setting up or running the GPU effect.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Pipeline creation failed.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    /// The destination or an input uses a format the effect cannot handle.
    #[error("unsupported texture format: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    /// The blit chain needs a source color texture.
    #[error("blit chain output requires a source color view")]
    MissingSourceColor,

    /// Direct composite reads depth and normals from the G-buffer only.
    #[error("direct composite output requires G-buffer inputs")]
    DirectCompositeNeedsGBuffer,

    /// Mapping a readback buffer failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// Saving a captured frame failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Plan execution failed.
    #[error(transparent)]
    Core(#[from] ObscuranceError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
