//! Output sinks: how the effect reaches the host's color target.

use obscurance_core::{EffectParameters, NormalSource, PassPlan};

/// Rendering path reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPath {
    #[default]
    Forward,
    Deferred,
}

/// Where the effect writes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSink {
    /// One fused pass, sourced from the G-buffer, multiplied onto the
    /// host's existing color target.
    DirectComposite,
    /// Source color to destination through the planned pass chain.
    BlitChain,
}

impl OutputSink {
    /// Picks the sink once at setup.
    ///
    /// Direct composite needs both a deferred path and the host's support
    /// for drawing into its color target.
    pub fn select(path: RenderPath, supports_direct_composite: bool) -> Self {
        match path {
            RenderPath::Deferred if supports_direct_composite => Self::DirectComposite,
            _ => Self::BlitChain,
        }
    }

    /// Pass plan for one frame.
    pub fn plan(self, params: &EffectParameters, width: u32, height: u32) -> PassPlan {
        match self {
            Self::DirectComposite => PassPlan::direct(),
            Self::BlitChain => PassPlan::for_frame(params, width, height),
        }
    }

    /// Normal source this sink requires, if it constrains it.
    pub fn required_source(self) -> Option<NormalSource> {
        match self {
            Self::DirectComposite => Some(NormalSource::GBuffer),
            Self::BlitChain => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscurance_core::NoiseFilter;

    #[test]
    fn test_select() {
        assert_eq!(
            OutputSink::select(RenderPath::Deferred, true),
            OutputSink::DirectComposite
        );
        assert_eq!(
            OutputSink::select(RenderPath::Deferred, false),
            OutputSink::BlitChain
        );
        assert_eq!(
            OutputSink::select(RenderPath::Forward, true),
            OutputSink::BlitChain
        );
    }

    #[test]
    fn test_direct_composite_is_single_pass() {
        let params = EffectParameters::new()
            .with_noise_filter(NoiseFilter::Wide)
            .with_downsampling(true);
        let direct = OutputSink::DirectComposite.plan(&params, 64, 64);
        assert_eq!(direct.pass_count(), 1);
        assert_eq!(direct.scratch_count(), 0);

        let chain = OutputSink::BlitChain.plan(&params, 64, 64);
        assert_eq!(chain.pass_count(), 4);
        assert_eq!(chain.scratch_count(), 2);
    }
}
