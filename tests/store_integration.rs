//! Property and scenario coverage for `PostgresStore` against a real
//! database (§8). `FakeStore`'s own unit tests in `src/store/fake.rs` cover
//! the same contract fast and deterministically; this suite exists to prove
//! the SQL behind `fetch_pending`'s skip-locked pickup and `create_pending`'s
//! conflict-aware upsert actually hold under a real server.

mod common;

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use igo_dispatch::ports::{MatchStore, TaskResult, TaskStore};
use igo_dispatch::types::entities::Match;
use igo_dispatch::types::enums::{MatchStatus, TaskStatus};
use igo_dispatch::types::primitives::{Coord, MatchId, MoveNumber, Priority};

use common::fixtures::TestDb;

fn sample_match(id: &str) -> Match {
    Match {
        match_id: MatchId::new(id).unwrap(),
        tournament: Some("LG Cup".to_string()),
        black_name: "Shin Jinseo".to_string(),
        white_name: "Park Junghwan".to_string(),
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

/// §8 property 1: `(match_id, move_number)` is unique - enforced here by the
/// real unique constraint, not just application logic.
#[tokio::test]
async fn uniqueness_is_enforced_by_the_schema() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("u1")).await.unwrap();

    let mid = MatchId::new("u1").unwrap();
    db.store
        .create_pending(&mid, MoveNumber::new(1), Priority::LIVE_NEW, None, None)
        .await
        .unwrap();
    // A second call with the same key must not create a duplicate row - the
    // ON CONFLICT arm absorbs it instead of erroring.
    db.store
        .create_pending(&mid, MoveNumber::new(1), Priority::HISTORICAL, None, None)
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE match_id = $1 AND move_number = 1")
        .bind(mid.as_str())
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

/// §8 property 2: running `N` concurrent `fetch_pending(k)` calls against `M`
/// seeded pending tasks yields a disjoint union of size `min(N*k, M)`.
#[tokio::test]
async fn atomic_pickup_partitions_concurrent_callers() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("atomic")).await.unwrap();
    let mid = MatchId::new("atomic").unwrap();

    for mn in 1..=20u32 {
        db.store
            .create_pending(&mid, MoveNumber::new(mn), Priority::LIVE_NEW, None, None)
            .await
            .unwrap();
    }

    let store = Arc::new(db.store);
    let callers = (0..4).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_pending(5).await.unwrap() })
    });

    let results: Vec<_> = join_all(callers).await.into_iter().map(Result::unwrap).collect();

    let mut all_ids: Vec<i64> = results.iter().flatten().map(|t| t.id).collect();
    let total = all_ids.len();
    all_ids.sort_unstable();
    all_ids.dedup();
    assert_eq!(total, 20, "every seeded task claimed exactly once");
    assert_eq!(all_ids.len(), total, "no task claimed by two callers");
}

/// §8 property 3: a single `fetch_pending` returns non-increasing priority.
#[tokio::test]
async fn fetch_pending_orders_by_priority_then_created_at() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("order")).await.unwrap();
    let mid = MatchId::new("order").unwrap();

    db.store
        .create_pending(&mid, MoveNumber::new(1), Priority::HISTORICAL, None, None)
        .await
        .unwrap();
    db.store
        .create_pending(&mid, MoveNumber::new(2), Priority::LIVE_NEW, None, None)
        .await
        .unwrap();
    db.store
        .create_pending(&mid, MoveNumber::new(3), Priority::FINISHED, None, None)
        .await
        .unwrap();

    let claimed = db.store.fetch_pending(10).await.unwrap();
    let priorities: Vec<_> = claimed.iter().map(|t| t.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);
    assert_eq!(claimed[0].priority, Priority::LIVE_NEW);
    assert_eq!(claimed.last().unwrap().priority, Priority::HISTORICAL);
}

/// §8 property 4/5: calling `create_pending` twice with the same key is a
/// no-op, but a strictly higher priority escalates a still-pending row, and a
/// lower one never regresses it.
#[tokio::test]
async fn upsert_idempotence_and_priority_escalation() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("esc")).await.unwrap();
    let mid = MatchId::new("esc").unwrap();

    let first = db
        .store
        .create_pending(&mid, MoveNumber::new(1), Priority::HISTORICAL, None, None)
        .await
        .unwrap();
    assert_eq!(first, 1, "first call inserts a new row");
    let second = db
        .store
        .create_pending(&mid, MoveNumber::new(1), Priority::HISTORICAL, None, None)
        .await
        .unwrap();
    assert_eq!(second, 0, "second call with the same key inserts nothing");

    let row = db
        .store
        .get_task_by_match_and_move(&mid, MoveNumber::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.priority, Priority::HISTORICAL);

    let escalation = db
        .store
        .create_pending(&mid, MoveNumber::new(1), Priority::LIVE_NEW, None, None)
        .await
        .unwrap();
    assert_eq!(escalation, 0, "escalating an existing row does not count as an insertion");
    let escalated = db
        .store
        .get_task_by_match_and_move(&mid, MoveNumber::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(escalated.priority, Priority::LIVE_NEW);

    let no_regression = db
        .store
        .create_pending(&mid, MoveNumber::new(1), Priority::HISTORICAL, None, None)
        .await
        .unwrap();
    assert_eq!(no_regression, 0);
    let unchanged = db
        .store
        .get_task_by_match_and_move(&mid, MoveNumber::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.priority, Priority::LIVE_NEW);
}

/// §8 property 6 / scenario S5: after `MAX_RETRIES` consecutive
/// `mark_failed` calls, the task is terminally `failed` and no longer
/// surfaces from `fetch_pending`.
#[tokio::test]
async fn retry_boundedness_reaches_terminal_failed() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("retry")).await.unwrap();
    let mid = MatchId::new("retry").unwrap();
    db.store
        .create_pending(&mid, MoveNumber::new(1), Priority::LIVE_NEW, None, None)
        .await
        .unwrap();

    let task = db.store.fetch_pending(1).await.unwrap().into_iter().next().unwrap();

    for expected in 1..=3u32 {
        db.store.mark_failed(task.id, "engine timed out", 3).await.unwrap();
        let reloaded = db.store.get_task_by_match_and_move(&mid, MoveNumber::new(1)).await.unwrap().unwrap();
        assert_eq!(reloaded.retry_count, expected);
        if expected < 3 {
            assert_eq!(reloaded.status, TaskStatus::Pending);
        } else {
            assert_eq!(reloaded.status, TaskStatus::Failed);
        }
    }

    assert!(db.store.fetch_pending(10).await.unwrap().is_empty());
}

/// §8 property 7 / scenario S6: after `reset_stale_running`, no task is left
/// `running`, and the recovered rows are immediately re-pickable.
#[tokio::test]
async fn crash_recovery_resets_running_and_is_repickable() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("crash")).await.unwrap();
    let mid = MatchId::new("crash").unwrap();

    for mn in 1..=5u32 {
        db.store
            .create_pending(&mid, MoveNumber::new(mn), Priority::LIVE_NEW, None, None)
            .await
            .unwrap();
    }
    let claimed = db.store.fetch_pending(5).await.unwrap();
    assert_eq!(claimed.len(), 5);
    assert_eq!(db.store.count_by_status(TaskStatus::Running).await.unwrap(), 5);

    // Simulate a crash: every claimed row stays `running` with no follow-up.
    let reset = db.store.reset_stale_running().await.unwrap();
    assert_eq!(reset, 5);
    assert_eq!(db.store.count_by_status(TaskStatus::Running).await.unwrap(), 0);

    let repicked = db.store.fetch_pending(16).await.unwrap();
    assert_eq!(repicked.len(), 5);
}

/// Scenario S2: a match transitioning `live -> finished` backfills the full
/// `[0..=new_count]` range without disturbing a task already completed.
#[tokio::test]
async fn finish_backfill_leaves_completed_tasks_untouched() {
    let db = TestDb::new().await;
    let mut m = sample_match("finish");
    m.moves = (1..=5).map(|i| Coord::new(format!("D{i}")).unwrap()).collect();
    db.store.upsert_from_poll(&m).await.unwrap();
    let mid = MatchId::new("finish").unwrap();

    // Move 3 was already analyzed before the match finished.
    db.store
        .create_pending(&mid, MoveNumber::new(3), Priority::LIVE_NEW, None, None)
        .await
        .unwrap();
    let already_there = db.store.fetch_pending(1).await.unwrap().into_iter().next().unwrap();
    db.store
        .save_result(
            already_there.id,
            &TaskResult {
                winrate: 0.5,
                score_lead: 0.0,
                top_moves: vec![],
                ownership: None,
            },
            None,
            None,
            false,
            false,
            false,
        )
        .await
        .unwrap();

    // Move 3 already has a row, so backfilling 0..=5 (6 positions) must
    // report exactly 5 new inserts, not 6 (§8 property 4, scenario S2).
    let mut inserted = 0u64;
    for mn in 0..=5u32 {
        inserted += db
            .store
            .create_pending(&mid, MoveNumber::new(mn), Priority::LIVE_BACKFILL, None, None)
            .await
            .unwrap();
    }
    assert_eq!(inserted, 5, "net new inserts = 6 positions - 1 already queued");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE match_id = $1")
        .bind(mid.as_str())
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 6, "moves 0..=5 inclusive, one row each");

    let reloaded = db.store.get_task_by_match_and_move(&mid, MoveNumber::new(3)).await.unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Success, "already-completed task untouched by backfill");
}

/// `get_live_matches` reflects status on the row, not an inferred value.
#[tokio::test]
async fn live_matches_excludes_finished() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("live-a")).await.unwrap();
    let mut finished = sample_match("live-b");
    finished.status = MatchStatus::Finished;
    db.store.upsert_from_poll(&finished).await.unwrap();

    let live = db.store.get_live_matches().await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].match_id.as_str(), "live-a");
}

/// Rollup fields are last-writer-wins (§9) but a subsequent poll upsert that
/// carries no rollup data of its own must not erase what classification
/// already wrote.
#[tokio::test]
async fn poll_upsert_does_not_clobber_engine_rollup() {
    let db = TestDb::new().await;
    db.store.upsert_from_poll(&sample_match("rollup")).await.unwrap();
    let mid = MatchId::new("rollup").unwrap();

    db.store.update_engine_rollup(&mid, 0.62, 3.5).await.unwrap();
    let reloaded = db.store.get_match(&mid).await.unwrap().unwrap();
    assert_eq!(reloaded.rollup_winrate, Some(0.62));
    assert_eq!(reloaded.rollup_score_lead, Some(3.5));

    db.store.upsert_from_poll(&sample_match("rollup")).await.unwrap();
    let still_there = db.store.get_match(&mid).await.unwrap().unwrap();
    assert_eq!(still_there.rollup_winrate, Some(0.62));
    assert_eq!(still_there.rollup_score_lead, Some(3.5));
}
