//! Core of obscurance-rs: screen-space ambient obscurance.
//!
//! This crate holds everything that does not need a GPU:
//! - [`EffectParameters`] configuration with clamp-on-set semantics
//! - the procedural sample [`kernel`], view-space [`reconstruct`]ion and
//!   the per-pixel occlusion [`estimator`]
//! - the separable noise [`filter`] and the darkening [`composite`]
//! - [`PassPlan`] selection and [`execute_plan`], which drives any
//!   [`PassBackend`]
//! - a software backend ([`SoftwareRenderer`]) over in-memory surfaces

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel coordinates and sample indices are converted to f32 throughout
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

pub mod composite;
pub mod cpu;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod frame;
pub mod kernel;
pub mod params;
pub mod plan;
pub mod reconstruct;
pub mod source;
pub mod surface;
pub mod variant;

pub use cpu::{CpuFrame, FrameReport, PoolStats, ScratchPool, SoftwareRenderer};
pub use error::{ObscuranceError, Result};
pub use estimator::estimate_occlusion;
pub use filter::{BlurAxis, FilterWidth};
pub use frame::FrameSettings;
pub use params::{EffectParameters, EstimatorMode, NoiseFilter, SampleCount};
pub use plan::{execute_plan, Pass, PassBackend, PassPlan, ScratchDesc, ScratchId, Step};
pub use reconstruct::{Projection, TangentFrame};
pub use source::{DepthNormalSource, GBufferDepthNormals, PackedDepthNormals, SurfaceSample};
pub use surface::{ColorSurface, DepthNormalSurface, MaskSurface, Surface};
pub use variant::{NormalSource, ProgramVariant, SampleTier};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
