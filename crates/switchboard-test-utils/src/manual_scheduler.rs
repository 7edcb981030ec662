// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler whose timers only fire when a test says so.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use switchboard_relay::{Scheduler, Tick, TimerHandle};

struct ManualTimer {
    handle: TimerHandle,
    interval: Duration,
    tick: Tick,
}

/// Records every armed timer. Cancelled timers stay in the log so tests can
/// check that a replaced handle really was cancelled.
#[derive(Default)]
pub struct ManualScheduler {
    timers: Mutex<Vec<ManualTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn timers(&self) -> MutexGuard<'_, Vec<ManualTimer>> {
        self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs one tick of the live timer named `key`. Returns `false` if none is live.
    pub async fn fire(&self, key: &str) -> bool {
        let tick = self
            .timers()
            .iter()
            .rev()
            .find(|t| t.handle.key() == key && !t.handle.is_cancelled())
            .map(|t| t.tick.clone());
        match tick {
            Some(tick) => {
                tick().await;
                true
            }
            None => false,
        }
    }

    /// Runs one tick of every live timer.
    pub async fn fire_all(&self) -> usize {
        let ticks: Vec<Tick> = self
            .timers()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .map(|t| t.tick.clone())
            .collect();
        for tick in &ticks {
            tick().await;
        }
        ticks.len()
    }

    /// Every handle ever armed under `key`, oldest first.
    pub fn handles(&self, key: &str) -> Vec<TimerHandle> {
        self.timers()
            .iter()
            .filter(|t| t.handle.key() == key)
            .map(|t| t.handle.clone())
            .collect()
    }

    pub fn interval(&self, key: &str) -> Option<Duration> {
        self.timers()
            .iter()
            .rev()
            .find(|t| t.handle.key() == key && !t.handle.is_cancelled())
            .map(|t| t.interval)
    }

    pub fn live_count(&self) -> usize {
        self.timers()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    pub fn armed_count(&self) -> usize {
        self.timers().len()
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&self, key: &str, interval: Duration, tick: Tick) -> TimerHandle {
        let handle = TimerHandle::new(key);
        self.timers().push(ManualTimer {
            handle: handle.clone(),
            interval,
            tick,
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn fires_only_live_timers() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let tick: Tick = {
            let count = count.clone();
            Arc::new(move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };

        let handle = scheduler.arm("k", Duration::from_secs(1), tick);
        assert!(scheduler.fire("k").await);
        scheduler.cancel(&handle);
        assert!(!scheduler.fire("k").await);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.live_count(), 0);
        assert_eq!(scheduler.armed_count(), 1);
    }
}
