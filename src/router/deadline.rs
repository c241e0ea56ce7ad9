use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Overall deadline for one request plus the token that tells in-flight work to stop
/// starting new steps once it passes.
#[derive(Debug, Clone)]
pub struct DeadlineContext {
    token: CancellationToken,
    deadline: Instant,
}

impl DeadlineContext {
    /// Deadline `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
