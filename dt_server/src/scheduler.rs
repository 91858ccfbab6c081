//! Lifecycle clock.
//!
//! Calls `tick` on a fixed interval. A failed tick is logged and retried on
//! the next one; End is safe to re-run, so no reward is granted twice.

use chrono::Utc;
use daily_tournament::tournament::{TickOutcome, TournamentLifecycleManager};
use std::time::{Duration, Instant};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{logging, metrics};

/// Ticks slower than this are logged as warnings
const SLOW_TICK_MS: u64 = 5_000;

/// Run one tick now and record its outcome
pub async fn run_tick(lifecycle: &TournamentLifecycleManager) -> Option<TickOutcome> {
    let now = Utc::now();
    let started = Instant::now();
    let result = lifecycle.tick(now).await;
    logging::log_performance("lifecycle_tick", started.elapsed().as_millis() as u64, SLOW_TICK_MS);

    match result {
        Ok(outcome) => {
            metrics::record_tick(&outcome);
            match &outcome {
                TickOutcome::Idle => tracing::debug!("Lifecycle tick: idle"),
                TickOutcome::Start { result } => tracing::info!(
                    tournament_id = result.tournament().id,
                    "Lifecycle tick started a tournament"
                ),
                TickOutcome::End { result } => {
                    tracing::info!("Lifecycle tick ended a tournament: {:?}", result)
                }
            }
            Some(outcome)
        }
        Err(e) => {
            metrics::lifecycle_tick_failures_total();
            tracing::error!("Lifecycle tick failed, retrying next tick: {}", e);
            None
        }
    }
}

/// Spawn the clock task
///
/// # Arguments
///
/// * `lifecycle` - Manager to drive
/// * `period` - Time between ticks; the first tick runs immediately
///
/// # Returns
///
/// * `JoinHandle<()>` - Abort it to stop the clock
pub fn spawn(lifecycle: TournamentLifecycleManager, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // After a stall one tick is enough to catch up
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Lifecycle clock running every {:?}, next transition at {}",
            period,
            lifecycle.schedule().next_transition(Utc::now())
        );

        loop {
            interval.tick().await;
            run_tick(&lifecycle).await;
        }
    })
}
