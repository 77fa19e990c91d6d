use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bestsweep_common::clock::Clock;
use tokio::{sync::watch, task::JoinHandle, time};
use tracing::debug;

/// Wall-clock timer backed by a single tokio interval task.
///
/// Every elapsed second is published on the `ticks` channel so connected
/// sockets can refresh their display between moves.
pub struct IntervalClock {
    elapsed: Arc<AtomicU64>,
    ticks: Arc<watch::Sender<u64>>,
    /// Bumped on every stop; a task only publishes while its run is current.
    run: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

/// Publishes `now` unless the run that produced it has been stopped since.
/// The check happens under the channel lock, so a stale value can never land
/// after a later `send_replace`.
fn publish_tick(ticks: &watch::Sender<u64>, run: &AtomicU64, current: u64, now: u64) -> bool {
    ticks.send_if_modified(|value| {
        if run.load(Ordering::SeqCst) != current {
            return false;
        }
        *value = now;
        true
    })
}

impl IntervalClock {
    pub fn new(ticks: Arc<watch::Sender<u64>>) -> Self {
        Self {
            elapsed: Arc::new(AtomicU64::new(0)),
            ticks,
            run: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.ticks.subscribe()
    }
}

impl Clock for IntervalClock {
    fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let elapsed = self.elapsed.clone();
        let ticks = self.ticks.clone();
        let run = self.run.clone();
        let current = run.load(Ordering::SeqCst);
        self.task = Some(tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let now = elapsed.fetch_add(1, Ordering::SeqCst) + 1;
                if !publish_tick(&ticks, &run, current, now) {
                    break;
                }
            }
        }));
        debug!("Clock started");
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.run.fetch_add(1, Ordering::SeqCst);
            task.abort();
            // detach from the aborted task so a late increment cannot leak in
            let settled = self.elapsed.load(Ordering::SeqCst);
            self.elapsed = Arc::new(AtomicU64::new(settled));
            debug!("Clock stopped at {}s", settled);
        }
    }

    fn reset(&mut self) {
        self.stop();
        self.elapsed.store(0, Ordering::SeqCst);
        self.ticks.send_replace(0);
    }

    fn elapsed_seconds(&self) -> u64 {
        self.elapsed.load(Ordering::SeqCst)
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        self.stop();
    }
}
