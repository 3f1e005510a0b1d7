//! Periodic update checks.
//!
//! Each tick spawns its own check so a slow release source never delays the
//! next tick. A check waits for an idle window when the runtime is asked to
//! use one, and otherwise yields to the scheduler first. Failures are logged
//! and dropped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use offgrid_worker::Runtime;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How the timer runs its checks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Schedule {
    pub interval: Duration,
    pub idle_scheduling: bool,
    /// Longest wait for an idle window before checking anyway.
    pub idle_wait: Duration,
}

pub(crate) type LastCheck = Arc<Mutex<Option<DateTime<Utc>>>>;

pub(crate) fn spawn_update_timer(runtime: Runtime, schedule: Schedule, last_check: LastCheck) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + schedule.interval, schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tokio::spawn(run_check(runtime.clone(), schedule, last_check.clone()));
        }
    })
}

pub(crate) async fn run_check(runtime: Runtime, schedule: Schedule, last_check: LastCheck) {
    if schedule.idle_scheduling {
        if !runtime.idle(schedule.idle_wait).await {
            tracing::debug!(in_flight = runtime.in_flight(), "no idle window, checking anyway");
        }
    } else {
        tokio::task::yield_now().await;
    }

    match runtime.update().await {
        Ok(outcome) => tracing::debug!(?outcome, "periodic update check"),
        Err(e) => tracing::warn!(error = %e, "periodic update check failed"),
    }
    *last_check.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
}
