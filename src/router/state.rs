/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Normalizing,
    Tier1Lookup,
    Tier2Lookup,
    Tier3Compute,
    Tier4Call,
    Store,
    Done,
    /// Terminal: answered by the heuristic after a failure or the deadline.
    FallbackDone,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalizing => "NORMALIZING",
            Self::Tier1Lookup => "TIER1_LOOKUP",
            Self::Tier2Lookup => "TIER2_LOOKUP",
            Self::Tier3Compute => "TIER3_COMPUTE",
            Self::Tier4Call => "TIER4_CALL",
            Self::Store => "STORE",
            Self::Done => "DONE",
            Self::FallbackDone => "FALLBACK_DONE",
        }
    }

    /// State after a miss in this one. `None` once there is no tier left to try.
    pub fn next_tier(&self) -> Option<Self> {
        match self {
            Self::Normalizing => Some(Self::Tier1Lookup),
            Self::Tier1Lookup => Some(Self::Tier2Lookup),
            Self::Tier2Lookup => Some(Self::Tier3Compute),
            Self::Tier3Compute => Some(Self::Tier4Call),
            Self::Tier4Call | Self::Store | Self::Done | Self::FallbackDone => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::FallbackDone)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
