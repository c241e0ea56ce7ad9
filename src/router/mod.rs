//! Request orchestration across the four tiers.
//!
//! ```text
//! NORMALIZING -> TIER1_LOOKUP -> TIER2_LOOKUP -> TIER3_COMPUTE -> TIER4_CALL
//!                      \______________\_______________\_______________\--> STORE -> DONE
//!                       any point, deadline passed or tier 4 failed  ----> FALLBACK_DONE
//! ```
//!
//! A tier advances the pipeline only on a miss. Tiers run strictly in order; nothing is
//! speculatively parallel. The overall deadline is a [`DeadlineContext`] whose
//! cancellation token is handed to the retry controller: once the deadline fires the
//! caller gets the heuristic result immediately, the in-flight provider call finishes
//! in the background, and its result (if any) is cached without overwriting anything.

pub mod deadline;
pub mod orchestrator;
pub mod state;

#[cfg(test)]
mod tests;

pub use deadline::DeadlineContext;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use state::PipelineState;
