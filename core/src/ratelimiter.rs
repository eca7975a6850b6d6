use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Token bucket shared across probes to pace connection attempts.
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    sem: Arc<Semaphore>,
    refill: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

impl RateLimiter {
    pub fn new(tokens_per_sec: u32) -> Self {
        let rate = tokens_per_sec.max(1);
        let burst = rate as usize;
        let sem = Arc::new(Semaphore::new(0));
        let sem_bg = sem.clone();
        let period = Duration::from_micros(1_000_000 / rate as u64);
        let refill = tokio::spawn(async move {
            let mut t = interval(period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                t.tick().await;
                // idle periods may bank at most one second worth of tokens
                if sem_bg.available_permits() < burst {
                    sem_bg.add_permits(1);
                }
            }
        });
        RateLimiter { inner: Arc::new(Inner { sem, refill }) }
    }

    /// Wait for one token and consume it.
    pub async fn acquire(&self) {
        if let Ok(permit) = self.inner.sem.acquire().await {
            permit.forget();
        }
    }
}
