//! Full flow integration tests: MovePoller -> Dispatcher -> DeltaClassifier.
//!
//! These tests drive the real pipeline end to end over in-memory fakes for
//! the listing API and engine (§8 scenarios S1-S4):
//! 1. The poller reconciles a tracked match against the listing source and
//!    enqueues analysis tasks for newly-arrived moves.
//! 2. The dispatcher picks those tasks up, analyzes them via the fake
//!    engine, and saves results.
//! 3. The classifier tags each result and updates the match rollup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use igo_dispatch::config::settings::DispatcherSettings;
use igo_dispatch::dispatcher::Dispatcher;
use igo_dispatch::error::Result;
use igo_dispatch::poller::MovePoller;
use igo_dispatch::ports::{AnalysisRequest, AnalysisResult, EngineClient, ListingApiClient, MatchSituation, MatchStore, TaskStore};
use igo_dispatch::store::FakeStore;
use igo_dispatch::types::entities::{CandidateMove, Match};
use igo_dispatch::types::enums::{MatchStatus, TaskStatus};
use igo_dispatch::types::primitives::{Coord, MatchId, MoveNumber, Priority};
use tokio_util::sync::CancellationToken;

/// A listing API backed by a fixed table of situations, mutable across the
/// test so a poll cycle can pick up newly "arrived" moves.
#[derive(Default)]
struct FakeListingApiClient {
    situations: Mutex<HashMap<String, MatchSituation>>,
}

impl FakeListingApiClient {
    fn set(&self, situation: MatchSituation) {
        self.situations.lock().unwrap().insert(situation.source_id.clone(), situation);
    }
}

#[async_trait]
impl ListingApiClient for FakeListingApiClient {
    async fn list_live_matches(&self) -> Result<Vec<String>> {
        Ok(self.situations.lock().unwrap().keys().cloned().collect())
    }

    async fn get_situation(&self, source_id: &str) -> Result<Option<MatchSituation>> {
        Ok(self.situations.lock().unwrap().get(source_id).cloned())
    }
}

/// An engine that always succeeds, reporting a winrate that trends toward
/// Black as more moves are fed in, so classification has something to see.
struct FakeEngineClient {
    calls: AtomicUsize,
}

impl FakeEngineClient {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EngineClient for FakeEngineClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Option<AnalysisResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let depth = request.moves.len() as f64;
        Ok(Some(AnalysisResult {
            winrate: 0.5 + depth * 0.01,
            score_lead: depth * 0.5,
            top_moves: vec![CandidateMove {
                coord: Coord::new("Q16").unwrap(),
                winrate: 0.5,
                score_lead: 0.0,
                visits: 100,
                prior: 0.2,
                principal_variation: vec![Coord::new("Q16").unwrap()],
            }],
            ownership: None,
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn sample_match(id: &str) -> Match {
    Match {
        match_id: MatchId::new(id).unwrap(),
        tournament: Some("Samsung Cup".to_string()),
        black_name: "Kim Jiseok".to_string(),
        white_name: "Gu Zihao".to_string(),
        status: MatchStatus::Live,
        moves: vec![Coord::new("Q16").unwrap()],
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

fn dispatcher_settings() -> DispatcherSettings {
    DispatcherSettings {
        window_size: 4,
        preempt_threshold: 500,
        task_timeout_ms: 5_000,
        max_retries: 3,
    }
}

async fn run_dispatcher_until<S, E, F>(dispatcher: Arc<Dispatcher<S, E>>, mut done: F)
where
    S: TaskStore + MatchStore + 'static,
    E: EngineClient + 'static,
    F: FnMut() -> bool,
{
    let shutdown = CancellationToken::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { dispatcher.run(shutdown).await })
    };

    for _ in 0..200 {
        if done() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

/// S1: a poll cycle on a match with one new move enqueues exactly one
/// `LIVE_NEW` task, which the dispatcher then analyzes to completion.
#[tokio::test]
async fn new_move_flows_from_poll_to_analyzed_result() {
    let store = Arc::new(FakeStore::new());
    store.upsert_from_poll(&sample_match("flow-1")).await.unwrap();

    let listing = Arc::new(FakeListingApiClient::default());
    listing.set(MatchSituation {
        source_id: "flow-1".to_string(),
        tournament: Some("Samsung Cup".to_string()),
        black_name: "Kim Jiseok".to_string(),
        white_name: "Gu Zihao".to_string(),
        status: MatchStatus::Live,
        moves: vec![Coord::new("Q16").unwrap(), Coord::new("D4").unwrap()],
        board_size: Some(19),
        komi: Some(7.5),
        rules: Some("chinese".to_string()),
        rollup_winrate: None,
        rollup_score_lead: None,
        round: None,
        date: None,
        black_rank: None,
        white_rank: None,
        result: None,
    });

    let poller = MovePoller::new(store.clone(), listing);
    poller.run().await.unwrap();

    let mid = MatchId::new("flow-1").unwrap();
    let task = store.get_task_by_match_and_move(&mid, MoveNumber::new(2)).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.priority, Priority::LIVE_NEW);
    assert_eq!(task.actual_move, Some(Coord::new("D4").unwrap()));

    let engine = Arc::new(FakeEngineClient::new());
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), engine, &dispatcher_settings(), 500));

    let store_check = store.clone();
    run_dispatcher_until(dispatcher, move || {
        matches!(
            futures::executor::block_on(store_check.get_task_by_match_and_move(&mid, MoveNumber::new(2))),
            Ok(Some(ref t)) if t.status == TaskStatus::Success
        )
    })
    .await;

    let finished = store.get_task_by_match_and_move(&mid, MoveNumber::new(2)).await.unwrap().unwrap();
    assert_eq!(finished.status, TaskStatus::Success);
    assert!(finished.winrate.is_some());

    let updated_match = store.get_match(&mid).await.unwrap().unwrap();
    assert!(updated_match.rollup_winrate.is_some());
}

/// S2: a match transitioning live -> finished triggers a full backfill of
/// every position, not just the newest one.
#[tokio::test]
async fn match_finishing_backfills_every_position() {
    let store = Arc::new(FakeStore::new());
    let mut m = sample_match("flow-2");
    m.moves = vec![Coord::new("Q16").unwrap(), Coord::new("D4").unwrap(), Coord::new("D16").unwrap()];
    store.upsert_from_poll(&m).await.unwrap();

    let listing = Arc::new(FakeListingApiClient::default());
    listing.set(MatchSituation {
        source_id: "flow-2".to_string(),
        tournament: None,
        black_name: "Kim Jiseok".to_string(),
        white_name: "Gu Zihao".to_string(),
        status: MatchStatus::Finished,
        moves: m.moves.clone(),
        board_size: Some(19),
        komi: Some(7.5),
        rules: Some("chinese".to_string()),
        rollup_winrate: None,
        rollup_score_lead: None,
        round: None,
        date: None,
        black_rank: None,
        white_rank: None,
        result: Some("B+3.5".to_string()),
    });

    let poller = MovePoller::new(store.clone(), listing);
    poller.run().await.unwrap();

    let mid = MatchId::new("flow-2").unwrap();
    for mn in 0..=3u32 {
        let task = store.get_task_by_match_and_move(&mid, MoveNumber::new(mn)).await.unwrap();
        assert!(task.is_some(), "move {mn} should have been backfilled");
    }
    assert_eq!(store.count_by_status(TaskStatus::Pending).await.unwrap(), 4);
}

/// Crash recovery: tasks left `running` when the dispatcher starts are reset
/// to `pending` before the first refill, so they aren't stranded forever.
#[tokio::test]
async fn dispatcher_recovers_stale_running_tasks_on_startup() {
    let store = Arc::new(FakeStore::new());
    store.upsert_from_poll(&sample_match("flow-3")).await.unwrap();
    let mid = MatchId::new("flow-3").unwrap();
    store
        .create_pending(&mid, MoveNumber::new(1), Priority::LIVE_NEW, None, None)
        .await
        .unwrap();
    // Simulate an abandoned in-flight task from a previous crashed process.
    store.fetch_pending(1).await.unwrap();
    assert_eq!(store.count_by_status(TaskStatus::Running).await.unwrap(), 1);

    let engine = Arc::new(FakeEngineClient::new());
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), engine, &dispatcher_settings(), 500));

    let store_check = store.clone();
    run_dispatcher_until(dispatcher, move || {
        matches!(
            futures::executor::block_on(store_check.get_task_by_match_and_move(&mid, MoveNumber::new(1))),
            Ok(Some(ref t)) if t.status == TaskStatus::Success
        )
    })
    .await;

    assert_eq!(store.count_by_status(TaskStatus::Running).await.unwrap(), 0);
}
