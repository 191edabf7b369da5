//! `PostgreSQL` implementation of store ports using `SQLx`.
//!
//! This module provides the primary persistence layer: the task queue (§4.1)
//! and the match record (§3) that feeds and is fed by the dispatcher.
//!
//! # Atomic pickup
//!
//! [`PostgresStore::fetch_pending`] implements the skip-locked realization of
//! §4.1: a single `UPDATE ... FROM (SELECT ... FOR UPDATE SKIP LOCKED)`
//! statement claims and flips rows to `running` in one round trip, so
//! concurrent dispatcher replicas never double-book a task. `SKIP LOCKED`
//! rows are invisible to the claiming statement, not merely excluded from its
//! result, so two callers racing for the same top-N pending rows partition
//! them rather than duplicate them.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, instrument, warn};

use crate::error::{InfraError, Result};
use crate::ports::store::TaskResult;
use crate::ports::{MatchStore, TaskStore};
use crate::types::entities::{CandidateMove, Match, Task};
use crate::types::enums::{MatchStatus, Player, TaskStatus};
use crate::types::primitives::{Coord, MatchId, MoveNumber, Priority};

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// `PostgreSQL`-based store implementation.
///
/// Implements both [`TaskStore`] and [`MatchStore`] over a single connection
/// pool; the two relations are related by `match_id` but have independent
/// lifecycles (§3).
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new `PostgreSQL` store with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InfraError::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROW TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    match_id: String,
    move_number: i32,
    status: String,
    priority: i32,
    actual_move: Option<String>,
    actual_player: Option<String>,
    winrate: Option<f64>,
    score_lead: Option<f64>,
    top_moves: Option<Json<Vec<CandidateMove>>>,
    ownership: Option<Json<Vec<f64>>>,
    delta_winrate: Option<f64>,
    delta_score: Option<f64>,
    is_brilliant: bool,
    is_mistake: bool,
    is_questionable: bool,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    analyzed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for Task {
    type Error = InfraError;

    fn try_from(row: TaskRow) -> std::result::Result<Self, Self::Error> {
        let status = TaskStatus::try_from(row.status.as_str())
            .map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e))))?;
        let actual_move = row
            .actual_move
            .map(|m| Coord::new(m).map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e)))))
            .transpose()?;
        let actual_player = row
            .actual_player
            .map(|p| {
                Player::try_from(p.as_str()).map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e))))
            })
            .transpose()?;

        Ok(Self {
            id: row.id,
            match_id: MatchId::new(row.match_id)
                .map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e))))?,
            move_number: MoveNumber::new(row.move_number as u32),
            status,
            priority: Priority::new(row.priority),
            actual_move,
            actual_player,
            winrate: row.winrate,
            score_lead: row.score_lead,
            top_moves: row.top_moves.map(|Json(v)| v),
            ownership: row.ownership.map(|Json(v)| v),
            delta_winrate: row.delta_winrate,
            delta_score: row.delta_score,
            is_brilliant: row.is_brilliant,
            is_mistake: row.is_mistake,
            is_questionable: row.is_questionable,
            error_message: row.error_message,
            retry_count: row.retry_count as u32,
            created_at: row.created_at,
            analyzed_at: row.analyzed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MatchRow {
    match_id: String,
    tournament: Option<String>,
    black_name: String,
    white_name: String,
    status: String,
    moves: Vec<String>,
    board_size: i16,
    komi: f64,
    rules: String,
    rollup_winrate: Option<f64>,
    rollup_score_lead: Option<f64>,
    round: Option<String>,
    date: Option<String>,
    black_rank: Option<String>,
    white_rank: Option<String>,
    result: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for Match {
    type Error = InfraError;

    fn try_from(row: MatchRow) -> std::result::Result<Self, Self::Error> {
        let moves = row
            .moves
            .into_iter()
            .map(|m| Coord::new(m).map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e)))))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            match_id: MatchId::new(row.match_id)
                .map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e))))?,
            tournament: row.tournament,
            black_name: row.black_name,
            white_name: row.white_name,
            status: MatchStatus::try_from(row.status.as_str())
                .map_err(|e| InfraError::Database(sqlx::Error::Decode(Box::new(e))))?,
            moves,
            board_size: row.board_size as u8,
            komi: row.komi,
            rules: row.rules,
            rollup_winrate: row.rollup_winrate,
            rollup_score_lead: row.rollup_score_lead,
            round: row.round,
            date: row.date,
            black_rank: row.black_rank,
            white_rank: row.white_rank,
            result: row.result,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TASK STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl TaskStore for PostgresStore {
    #[instrument(skip(self), fields(limit))]
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Task>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, TaskRow>(
            r"
            WITH claimed AS (
                SELECT id
                FROM tasks
                WHERE status = 'pending'
                ORDER BY priority DESC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE tasks
            SET status = 'running'
            WHERE id IN (SELECT id FROM claimed)
            RETURNING *
            ",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        let mut tasks = rows
            .into_iter()
            .map(Task::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // UPDATE ... RETURNING does not preserve the claiming SELECT's order,
        // so re-sort here: priority DESC, created_at ASC (§4.1, §8 property 3).
        tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        debug!(claimed = tasks.len(), "fetched pending tasks");
        Ok(tasks)
    }

    #[instrument(skip(self))]
    async fn peek_highest_pending_priority(&self) -> Result<Option<Priority>> {
        let value: Option<i32> =
            sqlx::query_scalar("SELECT MAX(priority) FROM tasks WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        Ok(value.map(Priority::new))
    }

    #[instrument(skip(self))]
    async fn reset_stale_running(&self) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE tasks
            SET status = 'pending'
            WHERE status = 'running'
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        let reset = result.rows_affected();
        if reset > 0 {
            warn!(reset, "recovered stale running tasks on startup");
        }
        Ok(reset)
    }

    #[instrument(skip(self, result))]
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
        sqlx::query(
            r"
            UPDATE tasks
            SET status = 'success',
                winrate = $2,
                score_lead = $3,
                top_moves = $4,
                ownership = $5,
                delta_winrate = $6,
                delta_score = $7,
                is_brilliant = $8,
                is_mistake = $9,
                is_questionable = $10,
                error_message = NULL,
                analyzed_at = now()
            WHERE id = $1
            ",
        )
        .bind(task_id)
        .bind(result.winrate)
        .bind(result.score_lead)
        .bind(Json(&result.top_moves))
        .bind(result.ownership.as_ref().map(Json))
        .bind(delta_winrate)
        .bind(delta_score)
        .bind(is_brilliant)
        .bind(is_mistake)
        .bind(is_questionable)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_failed(&self, task_id: i64, error_message: &str, max_retries: u32) -> Result<()> {
        sqlx::query(
            r"
            UPDATE tasks
            SET retry_count = retry_count + 1,
                error_message = $2,
                status = CASE WHEN retry_count + 1 >= $3 THEN 'failed' ELSE 'pending' END
            WHERE id = $1
            ",
        )
        .bind(task_id)
        .bind(error_message)
        .bind(i32::try_from(max_retries).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_pending(&self, task_id: i64) -> Result<()> {
        sqlx::query("UPDATE tasks SET status = 'pending' WHERE id = $1 AND status = 'running'")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_pending(
        &self,
        match_id: &MatchId,
        move_number: MoveNumber,
        priority: Priority,
        actual_move: Option<&Coord>,
        actual_player: Option<Player>,
    ) -> Result<u64> {
        // §4.1: insert if absent; if present and still pending with a
        // strictly lower priority, raise it; otherwise leave the row alone.
        // A concurrent producer racing on the same (match_id, move_number)
        // hits the unique constraint and is treated as "already exists"
        // (§7 error kind 6) via ON CONFLICT DO UPDATE.
        //
        // `xmax = 0` is the standard Postgres idiom for telling an inserted
        // tuple from one reached via the `DO UPDATE` path: a freshly inserted
        // row has no deleting transaction id yet, so `xmax` reads as zero.
        // When the `WHERE` clause on the `DO UPDATE` doesn't match (nothing to
        // escalate), no row is returned at all, same as `DO NOTHING` would.
        let inserted: Option<bool> = sqlx::query_scalar(
            r"
            INSERT INTO tasks (match_id, move_number, priority, actual_move, actual_player)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT tasks_match_move_unique
            DO UPDATE SET priority = EXCLUDED.priority
            WHERE tasks.status = 'pending' AND tasks.priority < EXCLUDED.priority
            RETURNING (xmax = 0)
            ",
        )
        .bind(match_id.as_str())
        .bind(i32::from(move_number))
        .bind(i32::from(priority))
        .bind(actual_move.map(Coord::as_str))
        .bind(actual_player.map(Player::letter))
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(u64::from(inserted.unwrap_or(false)))
    }

    #[instrument(skip(self))]
    async fn get_task_by_match_and_move(
        &self,
        match_id: &MatchId,
        move_number: MoveNumber,
    ) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE match_id = $1 AND move_number = $2",
        )
        .bind(match_id.as_str())
        .bind(i32::from(move_number))
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(Task::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self))]
    async fn count_by_status(&self, status: TaskStatus) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = $1")
            .bind(status.name())
            .fetch_one(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        Ok(count as u64)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCH STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl MatchStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get_match(&self, match_id: &MatchId) -> Result<Option<Match>> {
        let row = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE match_id = $1")
            .bind(match_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        row.map(Match::try_from).transpose().map_err(Into::into)
    }

    #[instrument(skip(self, m))]
    async fn upsert_from_poll(&self, m: &Match) -> Result<()> {
        let moves: Vec<&str> = m.moves.iter().map(Coord::as_str).collect();

        sqlx::query(
            r"
            INSERT INTO matches (
                match_id, tournament, black_name, white_name, status, moves,
                board_size, komi, rules, rollup_winrate, rollup_score_lead,
                round, date, black_rank, white_rank, result, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now())
            ON CONFLICT (match_id) DO UPDATE SET
                tournament = EXCLUDED.tournament,
                black_name = EXCLUDED.black_name,
                white_name = EXCLUDED.white_name,
                status = EXCLUDED.status,
                moves = EXCLUDED.moves,
                board_size = EXCLUDED.board_size,
                komi = EXCLUDED.komi,
                rules = EXCLUDED.rules,
                rollup_winrate = COALESCE(EXCLUDED.rollup_winrate, matches.rollup_winrate),
                rollup_score_lead = COALESCE(EXCLUDED.rollup_score_lead, matches.rollup_score_lead),
                round = EXCLUDED.round,
                date = EXCLUDED.date,
                black_rank = EXCLUDED.black_rank,
                white_rank = EXCLUDED.white_rank,
                result = EXCLUDED.result,
                updated_at = now()
            ",
        )
        .bind(m.match_id.as_str())
        .bind(&m.tournament)
        .bind(&m.black_name)
        .bind(&m.white_name)
        .bind(m.status.name())
        .bind(&moves)
        .bind(i16::from(m.board_size))
        .bind(m.komi)
        .bind(&m.rules)
        .bind(m.rollup_winrate)
        .bind(m.rollup_score_lead)
        .bind(&m.round)
        .bind(&m.date)
        .bind(&m.black_rank)
        .bind(&m.white_rank)
        .bind(&m.result)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_engine_rollup(&self, match_id: &MatchId, winrate: f64, score_lead: f64) -> Result<()> {
        // Last-writer-wins by design (§4.5, §9 open question): the core does
        // not enforce that the rollup reflects the most-recently-played move,
        // only the most-recently-completed analysis.
        sqlx::query(
            "UPDATE matches SET rollup_winrate = $2, rollup_score_lead = $3, updated_at = now() WHERE match_id = $1",
        )
        .bind(match_id.as_str())
        .bind(winrate)
        .bind(score_lead)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_live_matches(&self) -> Result<Vec<Match>> {
        let rows = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE status = 'live'")
            .fetch_all(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(Match::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
//
// Property-based and scenario coverage against a real database (§8) lives in
// `tests/store_integration.rs`, which spins up PostgreSQL via testcontainers.
// Row (de)serialization is exercised in the Task/Match `TryFrom` impls below
// indirectly through those integration tests; there is no meaningful unit
// test for SQL string construction alone.
