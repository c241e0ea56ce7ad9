pub const VERDICT_TIER_HEADER: &str = "X-Verdict-Tier";
pub const VERDICT_STATUS_HEADER: &str = "X-Verdict-Status";
pub const VERDICT_STATUS_HEALTHY: &str = "healthy";
pub const VERDICT_STATUS_ERROR: &str = "error";

/// Which stage of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    ExactHit,
    SimilarHit,
    Heuristic,
    External,
    Fallback,
}

impl Tier {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            Tier::ExactHit => "HIT_T1_EXACT",
            Tier::SimilarHit => "HIT_T2_SIMILAR",
            Tier::Heuristic => "T3_HEURISTIC",
            Tier::External => "T4_EXTERNAL",
            Tier::Fallback => "FALLBACK",
        }
    }

    #[inline]
    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Tier::ExactHit | Tier::SimilarHit)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}
