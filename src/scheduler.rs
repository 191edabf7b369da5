//! Periodic Driver (C6): fires the move poller on a fixed interval and
//! supervises the dispatcher, restarting it if its loop ever exits
//! unexpectedly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::poller::MovePoller;
use crate::ports::{EngineClient, ListingApiClient, MatchStore, TaskStore};

/// How long the supervisor waits before restarting the dispatcher loop after
/// it exits with an error (§7).
const DISPATCHER_RESTART_DELAY: Duration = Duration::from_secs(10);

/// Runs the poller on a fixed interval with `max_instances=1`: if the
/// previous poll cycle is still running when the next tick fires, that tick
/// is skipped rather than queued, so cycles never overlap.
///
/// # Errors
///
/// Returns an error only if the poller itself returns one; individual
/// reconciliation failures inside a cycle are already swallowed by
/// [`MovePoller::run`].
#[instrument(skip(poller, shutdown))]
pub async fn drive_poller<S, L>(poller: Arc<MovePoller<S, L>>, interval: Duration, shutdown: CancellationToken) -> Result<()>
where
    S: TaskStore + MatchStore + 'static,
    L: ListingApiClient + 'static,
{
    let running = Arc::new(Mutex::new(()));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown.cancelled() => break,
        }

        let Ok(_guard) = running.clone().try_lock_owned() else {
            warn!("previous poll cycle still running, skipping this tick");
            continue;
        };

        if let Err(e) = poller.run().await {
            error!(error = %e, "poll cycle failed");
        }
    }

    info!("poller shut down");
    Ok(())
}

/// Supervises the dispatcher loop, restarting it after
/// [`DISPATCHER_RESTART_DELAY`] on any unexpected failure.
///
/// Per §7: a fatal dispatcher bug should not bring the whole service down -
/// in-flight tasks survive as `running` rows and are recovered by
/// `reset_stale_running` the next time [`Dispatcher::run`] starts up.
#[instrument(skip(dispatcher, shutdown))]
pub async fn supervise_dispatcher<S, E>(dispatcher: Arc<Dispatcher<S, E>>, shutdown: CancellationToken) -> Result<()>
where
    S: TaskStore + MatchStore + 'static,
    E: EngineClient + 'static,
{
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        match dispatcher.run(shutdown.clone()).await {
            Ok(()) => {
                info!("dispatcher loop exited cleanly");
                break;
            }
            Err(e) => {
                error!(error = %e, "dispatcher loop failed, restarting");
                tokio::select! {
                    () = tokio::time::sleep(DISPATCHER_RESTART_DELAY) => {}
                    () = shutdown.cancelled() => break,
                }
            }
        }
    }

    Ok(())
}
