//! TTL Sweep Task
//!
//! Background task that periodically advances a cache's expiration wheel.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Target of the sweep task.
pub trait Sweep {
    /// Instant at which the next bucket to sweep is fully expired, if it holds
    /// any entries.
    fn next_due(&self) -> Option<Instant>;

    /// Sweeps one bucket, returning how many entries were removed.
    fn sweep(&self) -> usize;
}

/// Owner side of a running sweep task.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signals the task to stop and waits until it has exited.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("TTL sweep task ended abnormally: {}", e);
        }
    }

    /// Cancels the task without waiting for it.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns a task on `runtime` that sweeps `target` once per `period`.
///
/// Before each sweep the task waits, without holding any cache lock, until
/// every entry in the bucket about to be swept has reached its expiration.
/// No entry is therefore removed before its TTL has elapsed. After such a
/// wait the period restarts from the sweep.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task(&Handle::current(), shared.clone(), Duration::from_millis(10));
/// // Later, when the cache is closed:
/// handle.shutdown().await;
/// ```
pub fn spawn_sweep_task<S>(runtime: &Handle, target: Arc<S>, period: Duration) -> SweepHandle
where
    S: Sweep + Send + Sync + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = runtime.spawn(async move {
        info!(
            "Starting TTL sweep task with interval of {} ms",
            period.as_millis()
        );

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {}
            }

            if let Some(due) = target.next_due() {
                if due > Instant::now() {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        _ = time::sleep_until(due) => {}
                    }
                    ticker.reset();
                }
            }

            let removed = target.sweep();
            if removed > 0 {
                debug!("TTL sweep: removed {} expired entries", removed);
            } else {
                trace!("TTL sweep: bucket empty");
            }
        }

        info!("TTL sweep task stopped");
    });

    SweepHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}
