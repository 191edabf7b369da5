//! In-memory [`TaskStore`]/[`MatchStore`] fakes for dispatcher, poller, and
//! classifier tests.
//!
//! Mirrors [`super::postgres::PostgresStore`]'s semantics (atomic pickup,
//! priority escalation, retry bookkeeping) without a database, so the
//! property suite in §8 can run fast and deterministically. Guarded the same
//! way [`crate::ports::FakeClock`] is: behind `#[cfg(any(test, feature =
//! "test-utils"))]`.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::ports::store::TaskResult;
use crate::ports::{MatchStore, TaskStore};
use crate::types::entities::{Match, Task};
use crate::types::enums::{Player, TaskStatus};
use crate::types::primitives::{Coord, MatchId, MoveNumber, Priority};

/// In-memory task/match store for tests.
#[derive(Debug, Default)]
pub struct FakeStore {
    tasks: Mutex<HashMap<i64, Task>>,
    matches: Mutex<HashMap<MatchId, Match>>,
    next_id: AtomicI64,
}

impl FakeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            matches: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a match directly, bypassing [`MatchStore::upsert_from_poll`].
    pub fn seed_match(&self, m: Match) {
        self.matches.lock().unwrap_or_else(|e| e.into_inner()).insert(m.match_id.clone(), m);
    }

    /// Insert a task directly with an explicit id and status, bypassing
    /// [`TaskStore::create_pending`]. Useful for seeding `running`/`success`
    /// rows a test needs to already exist.
    pub fn seed_task(&self, task: Task) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        self.next_id.fetch_max(task.id + 1, Ordering::SeqCst);
        tasks.insert(task.id, task);
    }

    /// Snapshot every task currently stored, for assertions.
    #[must_use]
    pub fn all_tasks(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = tasks.values().cloned().collect();
        out.sort_by_key(|t| t.id);
        out
    }

    /// Look up a single task by id, for assertions.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<Task> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
    }
}

#[async_trait]
impl TaskStore for FakeStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Task>> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending: Vec<i64> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect();

        pending.sort_by(|a, b| {
            let ta = &tasks[a];
            let tb = &tasks[b];
            tb.priority
                .cmp(&ta.priority)
                .then_with(|| ta.created_at.cmp(&tb.created_at))
        });
        pending.truncate(limit);

        let mut claimed = Vec::with_capacity(pending.len());
        for id in pending {
            if let Some(t) = tasks.get_mut(&id) {
                t.status = TaskStatus::Running;
                claimed.push(t.clone());
            }
        }
        Ok(claimed)
    }

    async fn peek_highest_pending_priority(&self) -> Result<Option<Priority>> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.priority)
            .max())
    }

    async fn reset_stale_running(&self) -> Result<u64> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut reset = 0u64;
        for t in tasks.values_mut() {
            if t.status == TaskStatus::Running {
                t.status = TaskStatus::Pending;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn save_result(
        &self,
        task_id: i64,
        result: &TaskResult,
        delta_winrate: Option<f64>,
        delta_score: Option<f64>,
        is_brilliant: bool,
        is_mistake: bool,
        is_questionable: bool,
    ) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(t) = tasks.get_mut(&task_id) {
            t.status = TaskStatus::Success;
            t.winrate = Some(result.winrate);
            t.score_lead = Some(result.score_lead);
            t.top_moves = Some(result.top_moves.clone());
            t.ownership = result.ownership.clone();
            t.delta_winrate = delta_winrate;
            t.delta_score = delta_score;
            t.is_brilliant = is_brilliant;
            t.is_mistake = is_mistake;
            t.is_questionable = is_questionable;
            t.error_message = None;
            t.analyzed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(&self, task_id: i64, error_message: &str, max_retries: u32) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(t) = tasks.get_mut(&task_id) {
            t.retry_count += 1;
            t.error_message = Some(error_message.to_string());
            t.status = if t.retry_count >= max_retries {
                TaskStatus::Failed
            } else {
                TaskStatus::Pending
            };
        }
        Ok(())
    }

    async fn mark_pending(&self, task_id: i64) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(t) = tasks.get_mut(&task_id) {
            if t.status == TaskStatus::Running {
                t.status = TaskStatus::Pending;
            }
        }
        Ok(())
    }

    async fn create_pending(
        &self,
        match_id: &MatchId,
        move_number: MoveNumber,
        priority: Priority,
        actual_move: Option<&Coord>,
        actual_player: Option<Player>,
    ) -> Result<u64> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = tasks
            .values_mut()
            .find(|t| t.match_id == *match_id && t.move_number == move_number)
        {
            if existing.status == TaskStatus::Pending && existing.priority < priority {
                existing.priority = priority;
            }
            return Ok(0);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tasks.insert(
            id,
            Task {
                id,
                match_id: match_id.clone(),
                move_number,
                status: TaskStatus::Pending,
                priority,
                actual_move: actual_move.cloned(),
                actual_player,
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
            },
        );
        Ok(1)
    }

    async fn get_task_by_match_and_move(
        &self,
        match_id: &MatchId,
        move_number: MoveNumber,
    ) -> Result<Option<Task>> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tasks
            .values()
            .find(|t| t.match_id == *match_id && t.move_number == move_number)
            .cloned())
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<u64> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tasks.values().filter(|t| t.status == status).count() as u64)
    }
}

#[async_trait]
impl MatchStore for FakeStore {
    async fn get_match(&self, match_id: &MatchId) -> Result<Option<Match>> {
        Ok(self.matches.lock().unwrap_or_else(|e| e.into_inner()).get(match_id).cloned())
    }

    async fn upsert_from_poll(&self, m: &Match) -> Result<()> {
        self.matches.lock().unwrap_or_else(|e| e.into_inner()).insert(m.match_id.clone(), m.clone());
        Ok(())
    }

    async fn update_engine_rollup(&self, match_id: &MatchId, winrate: f64, score_lead: f64) -> Result<()> {
        let mut matches = self.matches.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(m) = matches.get_mut(match_id) {
            m.rollup_winrate = Some(winrate);
            m.rollup_score_lead = Some(score_lead);
        }
        Ok(())
    }

    async fn get_live_matches(&self) -> Result<Vec<Match>> {
        use crate::types::enums::MatchStatus;
        let matches = self.matches.lock().unwrap_or_else(|e| e.into_inner());
        Ok(matches.values().filter(|m| m.status == MatchStatus::Live).cloned().collect())
    }
}
