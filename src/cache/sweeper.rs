use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, info};

use super::exact::ExactCache;

/// Periodic expiry sweep over the exact cache.
///
/// Lookups already expire entries lazily; the sweep only reclaims memory held by
/// entries nobody asks for again.
pub struct ExpirySweeper {
    cache: Arc<ExactCache>,
    interval: Duration,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
}

impl ExpirySweeper {
    pub fn new(cache: Arc<ExactCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            stop_notify: Arc::new(Notify::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one sweep immediately.
    pub fn sweep_now(&self) -> usize {
        self.cache.purge_expired_at(Instant::now())
    }

    /// Starts the background task (no-op if already running).
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        // AcqRel: only one caller may win the swap and spawn the loop.
        if self.running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }
        self.stop_requested.store(false, Ordering::Release);

        let cache = Arc::clone(&self.cache);
        let interval = self.interval;
        let running = Arc::clone(&self.running);
        let stop_requested = Arc::clone(&self.stop_requested);
        let stop_notify = Arc::clone(&self.stop_notify);

        info!(interval_secs = interval.as_secs(), "Starting cache expiry sweeper");

        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // The first tick completes immediately; skip it so the first sweep
            // happens one interval after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_notify.notified() => {}
                }
                if stop_requested.load(Ordering::Acquire) {
                    break;
                }

                let removed = cache.purge_expired_at(Instant::now());
                debug!(removed, remaining = cache.len(), "Expiry sweep finished");
            }
            running.store(false, Ordering::Release);
            debug!("Cache expiry sweeper stopped");
        })
    }

    /// Asks the background task to exit after its current iteration.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_one();
    }
}

impl std::fmt::Debug for ExpirySweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySweeper")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
