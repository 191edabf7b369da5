//! Analysis Dispatcher (C4): a single cooperative loop that keeps a bounded
//! window of engine analyses in flight, preempting the lowest-priority one
//! when a much more urgent task shows up pending.
//!
//! The window is `WINDOW_SIZE` [`tokio::task::JoinSet`] entries wide. Each
//! entry's own future does all the store writes for its outcome (`save_result`
//! on success, `mark_failed` on transport/engine error or timeout); the main
//! loop only tracks priorities and decides when to cancel one. Preemption
//! cancels cooperatively via [`tokio::task::AbortHandle::abort`], which tokio
//! surfaces as a cancelled `JoinError` on the next `join_next()` - distinct
//! from a timeout or an engine error, which both resolve normally and carry
//! their own outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::DeltaClassifier;
use crate::config::settings::DispatcherSettings;
use crate::error::{AppError, DomainError, Result};
use crate::ports::{AnalysisRequest, EngineClient, EngineMove, MatchStore, TaskResult, TaskStore};
use crate::types::entities::{Match, Task};
use crate::types::primitives::{MoveNumber, Priority};

/// Outcome of one in-flight analysis, surfaced to the main loop for logging
/// only - the spawned future has already written its own result to the store
/// by the time it returns this.
enum TaskOutcome {
    Success,
    Failed(String),
}

/// The bounded set of currently in-flight analyses.
struct InFlight {
    handles: JoinSet<(i64, TaskOutcome)>,
    abort: HashMap<i64, AbortHandle>,
    priorities: HashMap<i64, Priority>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            handles: JoinSet::new(),
            abort: HashMap::new(),
            priorities: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.abort.len()
    }

    fn is_empty(&self) -> bool {
        self.abort.is_empty()
    }
}

/// The priority-ordered, preemptive analysis dispatcher.
pub struct Dispatcher<S, E> {
    store: Arc<S>,
    engine: Arc<E>,
    window_size: usize,
    preempt_threshold: i32,
    task_timeout: Duration,
    max_retries: u32,
    max_visits: u32,
}

impl<S, E> Dispatcher<S, E>
where
    S: TaskStore + MatchStore + 'static,
    E: EngineClient + 'static,
{
    /// Build a dispatcher over the given store and engine client.
    pub fn new(store: Arc<S>, engine: Arc<E>, settings: &DispatcherSettings, max_visits: u32) -> Self {
        Self {
            store,
            engine,
            window_size: settings.window_size,
            preempt_threshold: settings.preempt_threshold,
            task_timeout: settings.task_timeout(),
            max_retries: settings.max_retries,
            max_visits,
        }
    }

    /// Run the dispatcher loop until `shutdown` is cancelled.
    ///
    /// Recovers any tasks abandoned by a prior crash before the first fill,
    /// then alternates between waiting for completions, checking whether the
    /// pending queue warrants preempting the least urgent in-flight task, and
    /// refilling the window. On shutdown, lets in-flight analyses finish
    /// rather than aborting them - dropping a `JoinSet` aborts everything
    /// still in it, which would strand rows `running` unnecessarily.
    ///
    /// # Errors
    ///
    /// Returns an error on a store failure reading the pending queue, or if
    /// an in-flight task panics rather than completing or being cancelled -
    /// the caller (the supervisor in [`crate::scheduler`]) restarts the loop
    /// after such a failure.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let reset = self.store.reset_stale_running().await?;
        if reset > 0 {
            info!(reset, "recovered stale running tasks at startup");
        }

        let mut in_flight = InFlight::new();
        self.refill(&mut in_flight).await?;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if in_flight.is_empty() {
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_secs(5)) => {}
                    () = shutdown.cancelled() => break,
                }
                self.refill(&mut in_flight).await?;
                continue;
            }

            let joined = tokio::select! {
                joined = in_flight.handles.join_next() => joined,
                () = shutdown.cancelled() => break,
            };

            let Some(joined) = joined else {
                continue;
            };

            match joined {
                Ok((task_id, outcome)) => {
                    in_flight.abort.remove(&task_id);
                    in_flight.priorities.remove(&task_id);
                    match outcome {
                        TaskOutcome::Success => debug!(task_id, "analysis completed"),
                        TaskOutcome::Failed(reason) => warn!(task_id, reason, "analysis failed"),
                    }
                }
                Err(join_err) if join_err.is_cancelled() => {
                    debug!("in-flight analysis was preempted");
                }
                Err(join_err) => {
                    error!(error = %join_err, "in-flight analysis task panicked");
                    return Err(AppError::Initialization(format!("dispatcher task panicked: {join_err}")));
                }
            }

            self.preempt_if_needed(&mut in_flight).await?;
            self.refill(&mut in_flight).await?;
        }

        info!("shutdown requested, draining in-flight analyses");
        while in_flight.handles.join_next().await.is_some() {}
        Ok(())
    }

    async fn refill(&self, in_flight: &mut InFlight) -> Result<()> {
        let available = self.window_size.saturating_sub(in_flight.len());
        if available == 0 {
            return Ok(());
        }

        let tasks = self.store.fetch_pending(available).await?;
        for task in tasks {
            self.spawn_task(in_flight, task);
        }
        Ok(())
    }

    fn spawn_task(&self, in_flight: &mut InFlight, task: Task) {
        let task_id = task.id;
        let priority = task.priority;
        let store = self.store.clone();
        let engine = self.engine.clone();
        let task_timeout = self.task_timeout;
        let max_retries = self.max_retries;
        let max_visits = self.max_visits;

        let abort = in_flight.handles.spawn(async move {
            let outcome = execute_one(&store, &engine, &task, task_timeout, max_retries, max_visits).await;
            (task_id, outcome)
        });
        in_flight.abort.insert(task_id, abort);
        in_flight.priorities.insert(task_id, priority);
    }

    /// Preempt the lowest-priority in-flight task if the highest pending
    /// priority beats it by at least `preempt_threshold`. Cancels at most one
    /// task per call, matching the "one per wave" rule that prevents thrash.
    async fn preempt_if_needed(&self, in_flight: &mut InFlight) -> Result<()> {
        let Some(highest_pending) = self.store.peek_highest_pending_priority().await? else {
            return Ok(());
        };

        let mut lowest: Option<(i64, Priority)> = None;
        for (&id, &p) in &in_flight.priorities {
            if lowest.is_none_or(|(_, lp)| p < lp) {
                lowest = Some((id, p));
            }
        }
        let Some((lowest_id, lowest_priority)) = lowest else {
            return Ok(());
        };

        if highest_pending.value() - lowest_priority.value() >= self.preempt_threshold {
            if let Some(abort) = in_flight.abort.remove(&lowest_id) {
                abort.abort();
                in_flight.priorities.remove(&lowest_id);
                self.store.mark_pending(lowest_id).await?;
                info!(task_id = lowest_id, %highest_pending, %lowest_priority, "preempted lower-priority in-flight analysis");
            }
        }
        Ok(())
    }
}

/// Build the engine request for `task` and run it to completion, performing
/// whichever store write its outcome calls for. Lives outside `impl
/// Dispatcher` so it can be spawned as a free-standing `'static` future.
async fn execute_one<S, E>(
    store: &Arc<S>,
    engine: &Arc<E>,
    task: &Task,
    task_timeout: Duration,
    max_retries: u32,
    max_visits: u32,
) -> TaskOutcome
where
    S: TaskStore + MatchStore,
    E: EngineClient,
{
    let request = match build_request(store, task, max_visits).await {
        Ok(request) => request,
        Err(e) => {
            let _ = store.mark_failed(task.id, &e.to_string(), max_retries).await;
            return TaskOutcome::Failed(e.to_string());
        }
    };

    match tokio::time::timeout(task_timeout, engine.analyze(&request)).await {
        Ok(Ok(Some(result))) => {
            let task_result = TaskResult {
                winrate: result.winrate,
                score_lead: result.score_lead,
                top_moves: result.top_moves,
                ownership: result.ownership,
            };
            let classifier = DeltaClassifier::new(store.clone());
            match classifier.classify_and_save(task, &task_result).await {
                Ok(()) => TaskOutcome::Success,
                Err(e) => TaskOutcome::Failed(e.to_string()),
            }
        }
        Ok(Ok(None)) => {
            let message = "engine reported analysis error";
            let _ = store.mark_failed(task.id, message, max_retries).await;
            TaskOutcome::Failed(message.to_string())
        }
        Ok(Err(e)) => {
            let _ = store.mark_failed(task.id, &e.to_string(), max_retries).await;
            TaskOutcome::Failed(e.to_string())
        }
        Err(_elapsed) => {
            let message = "analysis timed out";
            let _ = store.mark_failed(task.id, message, max_retries).await;
            TaskOutcome::Failed(message.to_string())
        }
    }
}

/// Assemble the move sequence up to `task.move_number` from the match record
/// and build the engine request for it.
async fn build_request<S>(store: &Arc<S>, task: &Task, max_visits: u32) -> Result<AnalysisRequest>
where
    S: MatchStore,
{
    let m = store
        .get_match(&task.match_id)
        .await?
        .ok_or_else(|| DomainError::MatchNotFound(task.match_id.to_string()))?;

    let move_count = usize::try_from(task.move_number.value()).unwrap_or(usize::MAX);
    let moves = m
        .moves
        .iter()
        .take(move_count)
        .enumerate()
        .map(|(i, coord)| EngineMove {
            player: Match::mover_at(MoveNumber::new(u32::try_from(i).unwrap_or(u32::MAX) + 1)),
            coord: coord.as_str().to_string(),
        })
        .collect();

    Ok(AnalysisRequest {
        request_id: format!("{}-{}", task.match_id, task.move_number),
        moves,
        rules: m.rules.clone(),
        komi: m.komi,
        board_size: m.board_size,
        max_visits,
        priority: task.priority.value(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ports::AnalysisResult;
    use crate::store::FakeStore;
    use crate::types::enums::{MatchStatus, TaskStatus};
    use crate::types::primitives::MatchId;

    struct NoopEngine;

    #[async_trait::async_trait]
    impl EngineClient for NoopEngine {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<Option<AnalysisResult>> {
            Ok(None)
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn settings(preempt_threshold: i32) -> DispatcherSettings {
        DispatcherSettings {
            window_size: 2,
            preempt_threshold,
            task_timeout_ms: 30_000,
            max_retries: 3,
        }
    }

    fn sample_match(id: &str) -> Match {
        Match {
            match_id: MatchId::new(id).unwrap(),
            tournament: None,
            black_name: "Black".to_string(),
            white_name: "White".to_string(),
            status: MatchStatus::Live,
            moves: Vec::new(),
            board_size: 19,
            komi: 7.5,
            rules: "chinese".to_string(),
            rollup_winrate: None,
            rollup_score_lead: None,
            round: None,
            date: None,
            black_rank: None,
            white_rank: None,
            result: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// An in-flight entry whose spawned future never resolves on its own -
    /// `preempt_if_needed` only ever aborts it, it never joins naturally
    /// within these tests.
    fn spawn_forever(in_flight: &mut InFlight, id: i64, priority: Priority) {
        let abort = in_flight.handles.spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            (id, TaskOutcome::Success)
        });
        in_flight.abort.insert(id, abort);
        in_flight.priorities.insert(id, priority);
    }

    fn seed_running_task(store: &FakeStore, id: i64, match_id: &MatchId, priority: Priority) {
        store.seed_task(Task {
            id,
            match_id: match_id.clone(),
            move_number: MoveNumber::new(1),
            status: TaskStatus::Running,
            priority,
            actual_move: None,
            actual_player: None,
            winrate: None,
            score_lead: None,
            top_moves: None,
            ownership: None,
            delta_winrate: None,
            delta_score: None,
            is_brilliant: false,
            is_mistake: false,
            is_questionable: false,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
            analyzed_at: None,
        });
    }

    #[tokio::test]
    async fn preempts_lowest_priority_when_gap_at_least_threshold() {
        let store = Arc::new(FakeStore::new());
        let mid = MatchId::new("m1").unwrap();
        store.upsert_from_poll(&sample_match("m1")).await.unwrap();
        seed_running_task(&store, 99, &mid, Priority::USER_VIEW);
        store
            .create_pending(&mid, MoveNumber::new(2), Priority::LIVE_NEW, None, None)
            .await
            .unwrap();

        let mut in_flight = InFlight::new();
        spawn_forever(&mut in_flight, 99, Priority::USER_VIEW);

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(NoopEngine), &settings(500), 500);
        dispatcher.preempt_if_needed(&mut in_flight).await.unwrap();

        assert!(in_flight.abort.is_empty(), "preempted task removed from in-flight tracking");
        assert!(in_flight.priorities.is_empty());
        assert_eq!(store.get(99).unwrap().status, TaskStatus::Pending);
        assert_eq!(store.get(99).unwrap().retry_count, 0, "preemption is not a failed attempt");
    }

    #[tokio::test]
    async fn does_not_preempt_when_gap_is_below_threshold() {
        let store = Arc::new(FakeStore::new());
        let mid = MatchId::new("m1").unwrap();
        store.upsert_from_poll(&sample_match("m1")).await.unwrap();
        seed_running_task(&store, 99, &mid, Priority::USER_VIEW);
        store
            .create_pending(&mid, MoveNumber::new(2), Priority::LIVE_BACKFILL, None, None)
            .await
            .unwrap();

        let mut in_flight = InFlight::new();
        spawn_forever(&mut in_flight, 99, Priority::USER_VIEW);

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(NoopEngine), &settings(500), 500);
        dispatcher.preempt_if_needed(&mut in_flight).await.unwrap();

        assert_eq!(in_flight.abort.len(), 1, "gap below threshold leaves the in-flight task alone");
        assert_eq!(store.get(99).unwrap().status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn exactly_threshold_gap_preempts() {
        let store = Arc::new(FakeStore::new());
        let mid = MatchId::new("m1").unwrap();
        store.upsert_from_poll(&sample_match("m1")).await.unwrap();
        seed_running_task(&store, 99, &mid, Priority::USER_VIEW);
        store
            .create_pending(&mid, MoveNumber::new(2), Priority::LIVE_NEW, None, None)
            .await
            .unwrap();

        let mut in_flight = InFlight::new();
        spawn_forever(&mut in_flight, 99, Priority::USER_VIEW);

        // LIVE_NEW(1000) - USER_VIEW(500) == 500, exactly the threshold: the
        // comparison is inclusive.
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(NoopEngine), &settings(500), 500);
        dispatcher.preempt_if_needed(&mut in_flight).await.unwrap();

        assert!(in_flight.abort.is_empty());
    }

    #[tokio::test]
    async fn empty_pending_queue_is_a_noop() {
        let store = Arc::new(FakeStore::new());
        let mid = MatchId::new("m1").unwrap();
        store.upsert_from_poll(&sample_match("m1")).await.unwrap();
        seed_running_task(&store, 99, &mid, Priority::USER_VIEW);

        let mut in_flight = InFlight::new();
        spawn_forever(&mut in_flight, 99, Priority::USER_VIEW);

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(NoopEngine), &settings(500), 500);
        dispatcher.preempt_if_needed(&mut in_flight).await.unwrap();

        assert_eq!(in_flight.abort.len(), 1, "nothing pending means nothing to preempt for");
    }

    #[tokio::test]
    async fn preempts_at_most_one_task_per_call() {
        let store = Arc::new(FakeStore::new());
        let mid = MatchId::new("m1").unwrap();
        store.upsert_from_poll(&sample_match("m1")).await.unwrap();
        seed_running_task(&store, 1, &mid, Priority::HISTORICAL);
        seed_running_task(&store, 2, &mid, Priority::FINISHED);
        store
            .create_pending(&mid, MoveNumber::new(3), Priority::LIVE_NEW, None, None)
            .await
            .unwrap();

        let mut in_flight = InFlight::new();
        spawn_forever(&mut in_flight, 1, Priority::HISTORICAL);
        spawn_forever(&mut in_flight, 2, Priority::FINISHED);

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(NoopEngine), &settings(500), 500);
        dispatcher.preempt_if_needed(&mut in_flight).await.unwrap();

        assert_eq!(in_flight.abort.len(), 1, "only the single lowest-priority task is preempted per wave");
        assert!(!in_flight.abort.contains_key(&1), "the lower of the two (HISTORICAL) was the one preempted");
        assert_eq!(store.get(1).unwrap().status, TaskStatus::Pending);
        assert_eq!(store.get(2).unwrap().status, TaskStatus::Running);
    }
}
