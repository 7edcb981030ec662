// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repeating timers behind a swappable interface.
//!
//! [`TokioScheduler`] drives real timers. Tests can use paused tokio time or
//! the manual scheduler from `switchboard-test-utils`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Work performed on every tick. Each call produces a fresh future.
pub type Tick = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle to one armed timer. Cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    key: String,
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observed by the timer task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Arms and cancels repeating timers.
pub trait Scheduler: Send + Sync + 'static {
    /// Starts calling `tick` every `interval`, first one `interval` from now.
    ///
    /// Ticks for one handle never overlap: the next wait starts after the
    /// previous tick future completes.
    fn arm(&self, key: &str, interval: Duration, tick: Tick) -> TimerHandle;

    /// Stops the timer. A tick in flight is dropped at its next await.
    fn cancel(&self, handle: &TimerHandle) {
        handle.cancel();
    }
}

/// Scheduler backed by one tokio task per timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn arm(&self, key: &str, interval: Duration, tick: Tick) -> TimerHandle {
        let handle = TimerHandle::new(key);
        let token = handle.token.clone();
        let key = handle.key.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tick() => {}
                }
            }
            trace!(timer = %key, "timer stopped");
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    fn counting_tick(counter: Arc<AtomicUsize>) -> Tick {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.arm("k", Duration::from_secs(3), counting_tick(count.clone()));

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_future_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.arm("k", Duration::from_secs(1), counting_tick(count.clone()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        TokioScheduler.cancel(&handle);
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tick_delays_next_tick_instead_of_overlapping() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let tick: Tick = {
            let (active, max_active, runs) = (active.clone(), max_active.clone(), runs.clone());
            Arc::new(move || {
                let (active, max_active, runs) =
                    (active.clone(), max_active.clone(), runs.clone());
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };

        let handle = TokioScheduler.arm("slow", Duration::from_secs(1), tick);
        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.cancel();

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(runs.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_in_flight_tick() {
        let finished = Arc::new(AtomicUsize::new(0));
        let tick: Tick = {
            let finished = finished.clone();
            Arc::new(move || {
                let finished = finished.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };

        let handle = TokioScheduler.arm("k", Duration::from_secs(1), tick);
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
