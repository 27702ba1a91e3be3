//! Pass planning and execution.
//!
//! A frame is turned into a [`PassPlan`]: a flat list of scratch
//! acquisitions, passes and releases. The plan is decided once from the
//! noise filter and downsampling settings:
//!
//! | filter | downsampling | passes                                              |
//! |--------|--------------|-----------------------------------------------------|
//! | none   | off          | estimate+composite                                  |
//! | none   | on           | estimate, composite                                 |
//! | on     | off          | estimate, blur H, blur V+composite                  |
//! | on     | on           | estimate, blur H, blur V, composite                 |
//!
//! Scratch buffers are acquired right before their first write and released
//! right after their last read. [`execute_plan`] drives a [`PassBackend`]
//! through the plan and releases anything still held if a pass fails.

use crate::error::{ObscuranceError, Result};
use crate::filter::{BlurAxis, FilterWidth};
use crate::frame::{mask_size, FrameSettings};
use crate::params::EffectParameters;

/// Handle of a frame-scoped scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScratchId(pub u32);

/// Scratch buffer description; the format is always single-channel 8-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScratchDesc {
    pub width: u32,
    pub height: u32,
}

/// One full-screen pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Estimate and darken in one go, straight into the destination.
    EstimateComposite,
    /// Estimate into a mask.
    Estimate { output: ScratchId },
    /// One filter direction, mask to mask.
    Blur {
        axis: BlurAxis,
        width: FilterWidth,
        input: ScratchId,
        output: ScratchId,
    },
    /// Darken the source with a mask into the destination.
    Composite { mask: ScratchId },
    /// Final filter direction fused with the composite.
    BlurComposite {
        axis: BlurAxis,
        width: FilterWidth,
        mask: ScratchId,
    },
}

impl Pass {
    /// Scratch buffers this pass reads.
    pub fn reads(&self) -> Option<ScratchId> {
        match *self {
            Self::EstimateComposite | Self::Estimate { .. } => None,
            Self::Blur { input, .. } => Some(input),
            Self::Composite { mask } | Self::BlurComposite { mask, .. } => Some(mask),
        }
    }

    /// Scratch buffer this pass writes, `None` when it writes the destination.
    pub fn writes(&self) -> Option<ScratchId> {
        match *self {
            Self::Estimate { output } | Self::Blur { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Short name for logs and debug labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EstimateComposite => "estimate+composite",
            Self::Estimate { .. } => "estimate",
            Self::Blur { .. } => "blur",
            Self::Composite { .. } => "composite",
            Self::BlurComposite { .. } => "blur+composite",
        }
    }
}

/// A plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Acquire(ScratchId, ScratchDesc),
    Run(Pass),
    Release(ScratchId),
}

/// Ordered steps for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    steps: Vec<Step>,
}

const MASK: ScratchId = ScratchId(0);
const BLUR: ScratchId = ScratchId(1);

impl PassPlan {
    /// Plans a frame of `width` x `height`.
    pub fn for_frame(params: &EffectParameters, width: u32, height: u32) -> Self {
        let (mask_width, mask_height) = mask_size(params, width, height);
        let desc = ScratchDesc {
            width: mask_width,
            height: mask_height,
        };
        let filter = FilterWidth::for_filter(params.noise_filter());
        let downsampling = params.downsampling();

        let steps = match (filter, downsampling) {
            (None, false) => vec![Step::Run(Pass::EstimateComposite)],
            (None, true) => vec![
                Step::Acquire(MASK, desc),
                Step::Run(Pass::Estimate { output: MASK }),
                Step::Run(Pass::Composite { mask: MASK }),
                Step::Release(MASK),
            ],
            (Some(width), true) => vec![
                Step::Acquire(MASK, desc),
                Step::Run(Pass::Estimate { output: MASK }),
                Step::Acquire(BLUR, desc),
                Step::Run(Pass::Blur {
                    axis: BlurAxis::Horizontal,
                    width,
                    input: MASK,
                    output: BLUR,
                }),
                Step::Run(Pass::Blur {
                    axis: BlurAxis::Vertical,
                    width,
                    input: BLUR,
                    output: MASK,
                }),
                Step::Release(BLUR),
                Step::Run(Pass::Composite { mask: MASK }),
                Step::Release(MASK),
            ],
            (Some(width), false) => vec![
                Step::Acquire(MASK, desc),
                Step::Run(Pass::Estimate { output: MASK }),
                Step::Acquire(BLUR, desc),
                Step::Run(Pass::Blur {
                    axis: BlurAxis::Horizontal,
                    width,
                    input: MASK,
                    output: BLUR,
                }),
                Step::Release(MASK),
                Step::Run(Pass::BlurComposite {
                    axis: BlurAxis::Vertical,
                    width,
                    mask: BLUR,
                }),
                Step::Release(BLUR),
            ],
        };

        let plan = Self { steps };
        log::debug!(
            "obscurance plan for {width}x{height} (filter {:?}, downsampling {downsampling}): {}",
            params.noise_filter(),
            plan.describe()
        );
        plan
    }

    /// Plan of the direct composite path: one fused pass into the
    /// destination, whatever the filter and downsampling settings.
    pub fn direct() -> Self {
        Self {
            steps: vec![Step::Run(Pass::EstimateComposite)],
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Passes in execution order.
    pub fn passes(&self) -> impl Iterator<Item = &Pass> {
        self.steps.iter().filter_map(|step| match step {
            Step::Run(pass) => Some(pass),
            _ => None,
        })
    }

    pub fn pass_count(&self) -> usize {
        self.passes().count()
    }

    /// Number of distinct scratch buffers the plan acquires.
    pub fn scratch_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Acquire(..)))
            .count()
    }

    /// Pass names joined by arrows.
    pub fn describe(&self) -> String {
        self.passes().map(Pass::name).collect::<Vec<_>>().join(" -> ")
    }

    /// Checks that every scratch buffer is acquired before use, used only
    /// while held, and released exactly once by the end of the plan.
    pub fn validate(&self) -> Result<()> {
        let mut held: Vec<ScratchId> = Vec::new();
        for step in &self.steps {
            match *step {
                Step::Acquire(id, _) => {
                    if held.contains(&id) {
                        return Err(ObscuranceError::ScratchInUse(id));
                    }
                    held.push(id);
                }
                Step::Run(pass) => {
                    for id in pass.reads().into_iter().chain(pass.writes()) {
                        if !held.contains(&id) {
                            return Err(ObscuranceError::UnknownScratch(id));
                        }
                    }
                }
                Step::Release(id) => {
                    let Some(pos) = held.iter().position(|h| *h == id) else {
                        return Err(ObscuranceError::UnknownScratch(id));
                    };
                    held.swap_remove(pos);
                }
            }
        }
        if held.is_empty() {
            Ok(())
        } else {
            Err(ObscuranceError::InvalidPlan(format!(
                "scratch buffers {held:?} outlive the frame"
            )))
        }
    }
}

/// Something that can run the passes of a plan.
pub trait PassBackend {
    /// Makes a scratch buffer available under `id`.
    fn acquire(&mut self, id: ScratchId, desc: ScratchDesc) -> Result<()>;

    /// Returns a scratch buffer to the provider.
    fn release(&mut self, id: ScratchId);

    /// Runs one pass.
    fn execute(&mut self, pass: &Pass, settings: &FrameSettings) -> Result<()>;
}

/// Scratch buffers currently held on behalf of a running plan.
///
/// Dropping the lease releases whatever is still held, so a failing or
/// panicking pass cannot leak a buffer past the frame.
struct ScratchLease<'a, B: PassBackend + ?Sized> {
    backend: &'a mut B,
    held: Vec<ScratchId>,
}

impl<B: PassBackend + ?Sized> ScratchLease<'_, B> {
    fn acquire(&mut self, id: ScratchId, desc: ScratchDesc) -> Result<()> {
        if self.held.contains(&id) {
            return Err(ObscuranceError::ScratchInUse(id));
        }
        self.backend.acquire(id, desc)?;
        log::trace!("acquired scratch {id:?} ({}x{})", desc.width, desc.height);
        self.held.push(id);
        Ok(())
    }

    fn release(&mut self, id: ScratchId) -> Result<()> {
        let pos = self
            .held
            .iter()
            .position(|h| *h == id)
            .ok_or(ObscuranceError::UnknownScratch(id))?;
        self.held.swap_remove(pos);
        self.backend.release(id);
        log::trace!("released scratch {id:?}");
        Ok(())
    }
}

impl<B: PassBackend + ?Sized> Drop for ScratchLease<'_, B> {
    fn drop(&mut self) {
        for id in self.held.drain(..) {
            log::warn!("releasing scratch {id:?} after an aborted frame");
            self.backend.release(id);
        }
    }
}

/// Runs every step of `plan` on `backend`.
pub fn execute_plan<B: PassBackend + ?Sized>(
    plan: &PassPlan,
    settings: &FrameSettings,
    backend: &mut B,
) -> Result<()> {
    let mut lease = ScratchLease {
        backend,
        held: Vec::new(),
    };
    for step in plan.steps() {
        match step {
            Step::Acquire(id, desc) => lease.acquire(*id, *desc)?,
            Step::Run(pass) => lease.backend.execute(pass, settings)?,
            Step::Release(id) => lease.release(*id)?,
        }
    }
    Ok(())
}
