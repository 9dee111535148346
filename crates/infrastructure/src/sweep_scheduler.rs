use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use council_application::SweepJob;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Runs `job` every `interval` until `shutdown` turns true or its sender drops.
///
/// The first pass runs immediately. A pass that overruns delays the next tick
/// instead of bursting.
pub fn spawn_sweep(
    job: Arc<dyn SweepJob>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(job = job.name(), interval_ms = interval.as_millis(), "sweep started");

        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(job.as_ref()).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(job = job.name(), "sweep stopped");
    })
}

async fn run_once(job: &dyn SweepJob) {
    match job.run_sweep(Utc::now()).await {
        Ok(report) if report.failed > 0 => warn!(
            job = job.name(),
            processed = report.processed,
            failed = report.failed,
            "sweep pass finished with failures"
        ),
        Ok(report) => debug!(
            job = job.name(),
            processed = report.processed,
            failed = report.failed,
            "sweep pass finished"
        ),
        Err(error) => warn!(job = job.name(), error = %error, "sweep pass failed"),
    }
}
