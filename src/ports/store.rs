//! Storage port traits for data persistence.
//!
//! These traits define the contract for persisting and retrieving
//! domain entities. Infrastructure adapters implement these traits
//! using concrete storage backends (currently `PostgreSQL`).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::{Match, Ownership, Task};
use crate::types::enums::TaskStatus;
use crate::types::primitives::{Coord, MatchId, MoveNumber, Priority};

/// The engine-reported result of a single analyzed position, as saved back to
/// the task store.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Engine-reported winrate for Black at the root.
    pub winrate: f64,
    /// Engine-reported score lead for Black at the root.
    pub score_lead: f64,
    /// Top engine-ranked candidate moves.
    pub top_moves: Vec<crate::types::entities::CandidateMove>,
    /// Per-intersection ownership estimate.
    pub ownership: Option<Ownership>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TASK STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for analysis task persistence operations.
///
/// Handles the full task lifecycle:
/// - Atomic, concurrency-safe pickup of pending work ([`fetch_pending`])
/// - Result recording and retry bookkeeping
/// - Crash recovery for tasks abandoned by a dead worker
/// - Idempotent creation with priority escalation
///
/// [`fetch_pending`]: TaskStore::fetch_pending
///
/// # Implementation Notes
///
/// Implementations should:
/// - Use `SELECT ... FOR UPDATE SKIP LOCKED` for [`fetch_pending`] so
///   multiple dispatcher instances can share one queue without double-booking
///   a task
/// - Maintain a partial index on `(priority DESC, created_at ASC)` restricted
///   to `status = 'pending'` so pickup stays cheap as the table grows
/// - Treat `(match_id, move_number)` as a unique composite key
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Atomically claim up to `limit` pending tasks, highest priority first,
    /// ties broken by oldest `created_at`, and mark them `running`.
    ///
    /// Claimed rows are invisible to concurrent callers of this method until
    /// they are released back to `pending` or resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Task>>;

    /// Peek at the highest priority value among currently pending tasks,
    /// without claiming anything.
    ///
    /// Returns `None` if the pending queue is empty. Used by the dispatcher
    /// to decide whether a newly-arrived task should preempt an in-flight one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn peek_highest_pending_priority(&self) -> Result<Option<Priority>>;

    /// Bulk-transition every `running` task back to `pending`.
    ///
    /// Called once at startup to recover tasks abandoned by a crashed worker:
    /// since nothing has been picked up yet by the starting process, every
    /// `running` row at that point is definitionally abandoned, so the reset
    /// is unconditional rather than keyed off any staleness window. Returns
    /// the number of tasks reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn reset_stale_running(&self) -> Result<u64>;

    /// Save a successful engine result for a task and mark it `success`.
    ///
    /// Also stores the classification fields, which must be computed by the
    /// caller before invoking this method.
    ///
    /// # Errors
    ///
    /// Returns an error if the task doesn't exist or the database fails.
    #[allow(clippy::too_many_arguments)]
    async fn save_result(
        &self,
        task_id: i64,
        result: &TaskResult,
        delta_winrate: Option<f64>,
        delta_score: Option<f64>,
        is_brilliant: bool,
        is_mistake: bool,
        is_questionable: bool,
    ) -> Result<()>;

    /// Record a failed attempt.
    ///
    /// Increments `retry_count`; if it has not yet reached the configured
    /// maximum, the task returns to `pending` so it can be retried, otherwise
    /// it is marked `failed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the task doesn't exist or the database fails.
    async fn mark_failed(&self, task_id: i64, error_message: &str, max_retries: u32) -> Result<()>;

    /// Return a task to `pending` without touching its retry count.
    ///
    /// Used when a task is preempted rather than failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the task doesn't exist or the database fails.
    async fn mark_pending(&self, task_id: i64) -> Result<()>;

    /// Create a pending task for a position, or escalate its priority if one
    /// already exists for the same `(match_id, move_number)`.
    ///
    /// The escalation only ever raises priority: an existing task's priority
    /// is left untouched if `priority` is lower. Returns `1` if a new row was
    /// inserted and `0` if an existing row was left alone or merely escalated
    /// (§4.1: escalations do not count as insertions).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_pending(
        &self,
        match_id: &MatchId,
        move_number: MoveNumber,
        priority: Priority,
        actual_move: Option<&Coord>,
        actual_player: Option<crate::types::enums::Player>,
    ) -> Result<u64>;

    /// Look up a task by its match and move number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get_task_by_match_and_move(
        &self,
        match_id: &MatchId,
        move_number: MoveNumber,
    ) -> Result<Option<Task>>;

    /// Count tasks by status, for observability.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn count_by_status(&self, status: TaskStatus) -> Result<u64>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCH STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for tracked-match persistence operations.
///
/// # Implementation Notes
///
/// Implementations should use `match_id` as the primary key and upsert on
/// every poll cycle rather than diffing client-side.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Get a match by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get_match(&self, match_id: &MatchId) -> Result<Option<Match>>;

    /// Insert or update a match from freshly polled data.
    ///
    /// Uses upsert semantics keyed on `match_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert_from_poll(&self, m: &Match) -> Result<()>;

    /// Update a match's rollup winrate/score fields after a position finishes
    /// analysis.
    ///
    /// # Errors
    ///
    /// Returns an error if the match doesn't exist or the database fails.
    async fn update_engine_rollup(
        &self,
        match_id: &MatchId,
        winrate: f64,
        score_lead: f64,
    ) -> Result<()>;

    /// List matches currently marked `live`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get_live_matches(&self) -> Result<Vec<Match>>;
}
