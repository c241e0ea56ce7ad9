//! Request/result value types shared by every tier.

pub mod request;
pub mod result;
pub mod tier;


pub use request::{Difficulty, EvaluationRequest, PageContext, ParseEnumError};
pub use result::{EvaluationResult, Status};
pub use tier::{
    Tier, VERDICT_STATUS_ERROR, VERDICT_STATUS_HEADER, VERDICT_STATUS_HEALTHY,
    VERDICT_TIER_HEADER,
};
