//! Daily trigger for the stale-request sweep

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;

use crate::application::loan::{ServiceDependencies, reject_stale_requests};

/// Next occurrence of `at` (UTC) strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run the sweep once for the current UTC date
pub async fn run_sweep_once(deps: &ServiceDependencies) {
    let now = Utc::now();
    match reject_stale_requests(deps, now.date_naive(), now).await {
        Ok(count) => tracing::info!(rejected = count, "Stale request sweep finished"),
        Err(e) => tracing::error!(error = %e, "Stale request sweep failed"),
    }
}

/// Spawn a task that runs the sweep every day at `at` (UTC)
///
/// A failed run is logged and retried at the next scheduled time.
pub fn spawn_daily_sweep(deps: ServiceDependencies, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, at);
            tracing::debug!(next_run = %next, "Stale request sweep scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            run_sweep_once(&deps).await;
        }
    })
}
