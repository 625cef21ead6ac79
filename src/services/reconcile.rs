use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::services::monitor::Monitor;
use crate::services::runner::CommandRunner;
use crate::services::target_state::TargetState;

/// The two polling intervals of the reconciliation loop.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    /// State refresh interval
    pub state: Duration,
    /// Stats push / side-task interval, tracked as time since the last push
    pub stats: Duration,
}

/// Work run after a cycle whenever the stats interval has elapsed.
pub trait SideTask: Send {
    fn name(&self) -> &'static str;
    fn run(&mut self, targets: &[&TargetState]);
}

/// Drives the monitor until `stop` turns true (or its sender is dropped).
///
/// Each cycle refreshes the process table once and updates every target;
/// full stats are forced and side tasks run when the stats interval has
/// elapsed since the last push.
pub async fn run_loop<R: CommandRunner>(
    monitor: Arc<Mutex<Monitor<R>>>,
    cadence: Cadence,
    mut side_tasks: Vec<Box<dyn SideTask>>,
    mut stop: watch::Receiver<bool>,
) {
    log::info!(
        "Reconciliation loop started (state every {:?}, stats every {:?})",
        cadence.state,
        cadence.stats
    );

    if sleep_or_stop(cadence.state, &mut stop).await {
        log::info!("Reconciliation loop stopped");
        return;
    }

    let mut last_push: Option<Instant> = None;
    loop {
        let started = Instant::now();
        let push_stats = stats_due(last_push, started, cadence.stats);

        {
            let mut monitor = monitor.lock().await;
            let reports = monitor.run_cycle(push_stats).await;
            log::debug!(
                "Cycle done: {} of {} targets changed",
                reports.len(),
                monitor.target_count()
            );

            if push_stats {
                let targets: Vec<&TargetState> = monitor.targets().collect();
                for task in side_tasks.iter_mut() {
                    log::debug!("Running side task {}", task.name());
                    task.run(&targets);
                }
            }
        }

        if push_stats {
            last_push = Some(started);
        }

        let wait = next_wait(cadence.state, started.elapsed());
        if sleep_or_stop(wait, &mut stop).await {
            break;
        }
    }

    log::info!("Reconciliation loop stopped");
}

/// True on the first cycle and whenever `stats` has passed since the last push.
fn stats_due(last_push: Option<Instant>, now: Instant, stats: Duration) -> bool {
    last_push.map_or(true, |at| now.duration_since(at) >= stats)
}

/// Time left of the state period after a cycle that took `busy`.
fn next_wait(period: Duration, busy: Duration) -> Duration {
    period.saturating_sub(busy)
}

/// Sleeps for `duration`; returns true as soon as a stop is signalled.
async fn sleep_or_stop(duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    return true;
                }
            }
        }
    }
}
