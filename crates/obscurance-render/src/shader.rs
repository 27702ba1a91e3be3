//! WGSL assembly.
//!
//! Program variants are specialized by prepending a block of `const`
//! declarations to the shared sources, so every branch on a variant flag is
//! resolved by the shader compiler.

use crate::error::{RenderError, RenderResult};

/// Builder for a specialized WGSL module.
pub struct ShaderBuilder {
    constants: Vec<String>,
    sources: Vec<&'static str>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            sources: Vec::new(),
            label: None,
        }
    }

    /// Declares a `bool` constant.
    #[must_use]
    pub fn with_bool(mut self, name: &str, value: bool) -> Self {
        self.constants.push(format!("const {name}: bool = {value};"));
        self
    }

    /// Declares a `u32` constant.
    #[must_use]
    pub fn with_u32(mut self, name: &str, value: u32) -> Self {
        self.constants.push(format!("const {name}: u32 = {value}u;"));
        self
    }

    /// Declares an `i32` constant.
    #[must_use]
    pub fn with_i32(mut self, name: &str, value: i32) -> Self {
        self.constants.push(format!("const {name}: i32 = {value};"));
        self
    }

    /// Declares an `f32` constant.
    #[must_use]
    pub fn with_f32(mut self, name: &str, value: f32) -> Self {
        // Debug keeps a decimal point or exponent, which WGSL needs
        self.constants.push(format!("const {name}: f32 = {value:?};"));
        self
    }

    /// Appends a WGSL source. Sources are concatenated in order.
    #[must_use]
    pub fn with_source(mut self, source: &'static str) -> Self {
        self.sources.push(source);
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module (does not create pipeline).
    pub fn build_module(self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.combined_source()?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        Ok(module)
    }

    /// Header followed by every source.
    pub fn combined_source(&self) -> RenderResult<String> {
        if self.sources.is_empty() {
            return Err(RenderError::ShaderCompilationFailed(format!(
                "no sources for {}",
                self.label.as_deref().unwrap_or("unnamed shader")
            )));
        }

        let mut out = String::new();
        for constant in &self.constants {
            out.push_str(constant);
            out.push('\n');
        }
        for source in &self.sources {
            out.push('\n');
            out.push_str(source);
        }
        Ok(out)
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
