use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::error::ExternalError;
use super::provider::EvaluationProvider;
use crate::evaluation::{EvaluationRequest, EvaluationResult, Tier};

/// What a [`MockProvider`] does on one call.
#[derive(Debug, Clone)]
pub enum MockStep {
    Respond {
        result: EvaluationResult,
        delay: Duration,
    },
    Fail {
        error: ExternalError,
        delay: Duration,
    },
    /// Panics inside the call, for exercising task-failure handling.
    Panic,
}

impl MockStep {
    pub fn ok(score: u8) -> Self {
        Self::ok_after(score, Duration::ZERO)
    }

    pub fn ok_after(score: u8, delay: Duration) -> Self {
        Self::Respond {
            result: EvaluationResult::from_score(
                score,
                0.95,
                format!("Mock evaluation scored {score}"),
                Tier::External,
            ),
            delay,
        }
    }

    pub fn fail(error: ExternalError) -> Self {
        Self::fail_after(error, Duration::ZERO)
    }

    pub fn fail_after(error: ExternalError, delay: Duration) -> Self {
        Self::Fail { error, delay }
    }

    /// Never finishes within any sane timeout.
    pub fn hang() -> Self {
        Self::ok_after(90, Duration::from_secs(3600))
    }
}

/// Scripted provider: plays queued steps in order, then repeats the default step.
#[derive(Debug)]
pub struct MockProvider {
    script: Mutex<VecDeque<MockStep>>,
    default_step: MockStep,
    calls: AtomicU32,
    completed: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::always(MockStep::ok(90))
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call performs `step`.
    pub fn always(step: MockStep) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_step: step,
            calls: AtomicU32::new(0),
            completed: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// Plays `steps` first, then `default_step` forever.
    pub fn scripted(steps: impl IntoIterator<Item = MockStep>, default_step: MockStep) -> Self {
        let provider = Self::always(default_step);
        provider.script.lock().extend(steps);
        provider
    }

    pub fn push(&self, step: MockStep) {
        self.script.lock().push_back(step);
    }

    /// Calls started.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Acquire)
    }

    /// Calls that ran to the end (success or failure).
    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::Acquire)
    }

    /// Start time of every call, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }

    fn next_step(&self) -> MockStep {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_step.clone())
    }
}

impl EvaluationProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn evaluate(&self, _request: &EvaluationRequest) -> Result<EvaluationResult, ExternalError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.call_times.lock().push(Instant::now());

        let outcome = match self.next_step() {
            MockStep::Respond { result, delay } => {
                tokio::time::sleep(delay).await;
                Ok(result)
            }
            MockStep::Fail { error, delay } => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            MockStep::Panic => panic!("mock provider panicked"),
        };

        self.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }
}
