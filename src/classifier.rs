//! Delta Classifier (C5): tags a just-analyzed move as brilliant, a mistake,
//! or merely questionable by comparing its result to the previous position.
//!
//! Runs synchronously right after the dispatcher saves a result - there's no
//! separate queue or worker for this step, since the comparison is cheap and
//! always needs the freshly-written row anyway.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::ports::{MatchStore, TaskResult, TaskStore};
use crate::types::entities::Task;
use crate::types::enums::{Player, TaskStatus};
use crate::types::primitives::MatchId;

/// Score-lead swing above which a move is tagged brilliant.
pub const BRILLIANT_THRESHOLD: f64 = 2.0;
/// Score-lead swing below which a move is tagged a mistake.
pub const MISTAKE_THRESHOLD: f64 = -3.0;
/// Score-lead swing below which a move is tagged merely questionable.
pub const QUESTIONABLE_THRESHOLD: f64 = -1.0;

/// Classification deltas for one move, from the mover's own perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Winrate swing, positive if the move helped the mover.
    pub delta_winrate: f64,
    /// Score-lead swing, positive if the move helped the mover.
    pub delta_score: f64,
    /// `delta_score` exceeded [`BRILLIANT_THRESHOLD`].
    pub is_brilliant: bool,
    /// `delta_score` fell below [`MISTAKE_THRESHOLD`].
    pub is_mistake: bool,
    /// `delta_score` fell in `[MISTAKE_THRESHOLD, QUESTIONABLE_THRESHOLD)`.
    pub is_questionable: bool,
}

/// Compute the classification for a move given the engine results immediately
/// before and after it, both already normalized to Black's perspective.
///
/// A missing previous score lead is treated as `0.0` rather than skipping
/// classification - the position is assumed to have been even up to that
/// point absent any other information.
#[must_use]
pub fn classify(
    prev_winrate: f64,
    prev_score_lead: Option<f64>,
    result_winrate: f64,
    result_score_lead: f64,
    mover: Player,
) -> Classification {
    let mut delta_winrate = result_winrate - prev_winrate;
    let mut delta_score = result_score_lead - prev_score_lead.unwrap_or(0.0);

    // Both deltas are reported from Black's perspective by the engine; flip
    // sign so the move is judged from the perspective of whoever played it.
    if mover == Player::White {
        delta_winrate = -delta_winrate;
        delta_score = -delta_score;
    }

    Classification {
        delta_winrate,
        delta_score,
        is_brilliant: delta_score > BRILLIANT_THRESHOLD,
        is_mistake: delta_score < MISTAKE_THRESHOLD,
        is_questionable: (MISTAKE_THRESHOLD..QUESTIONABLE_THRESHOLD).contains(&delta_score),
    }
}

/// Classifies freshly-analyzed moves and folds the result back into the task
/// and match rollup.
pub struct DeltaClassifier<S> {
    store: Arc<S>,
}

impl<S> DeltaClassifier<S>
where
    S: TaskStore + MatchStore,
{
    /// Build a classifier over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Classify `task` against the previous position in the same match and
    /// persist the result, then refresh the match's rollup winrate/score.
    ///
    /// A no-op for move `0` (the empty board has nothing to compare against)
    /// and for any move whose predecessor hasn't successfully analyzed yet -
    /// the gap is simply left unclassified rather than blocking on it, since
    /// out-of-order completion is expected under preemption.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operations fail.
    #[instrument(skip(self, task, result), fields(match_id = %task.match_id, move_number = %task.move_number))]
    pub async fn classify_and_save(&self, task: &Task, result: &TaskResult) -> Result<()> {
        if task.move_number.is_start() {
            debug!("move 0 has no predecessor, skipping classification");
            return self.save_unclassified(task, result).await;
        }

        let Some(prev_number) = task.move_number.prev() else {
            return self.save_unclassified(task, result).await;
        };

        let Some(prev) = self.store.get_task_by_match_and_move(&task.match_id, prev_number).await? else {
            debug!("predecessor task does not exist yet, skipping classification");
            return self.save_unclassified(task, result).await;
        };

        if prev.status != TaskStatus::Success {
            debug!(predecessor_status = ?prev.status, "predecessor not yet successfully analyzed, skipping classification");
            return self.save_unclassified(task, result).await;
        }

        let Some(mover) = task.actual_player else {
            debug!("task has no actual_player recorded, skipping classification");
            return self.save_unclassified(task, result).await;
        };

        let classification = classify(
            prev.winrate.unwrap_or(0.5),
            prev.score_lead,
            result.winrate,
            result.score_lead,
            mover,
        );

        self.store
            .save_result(
                task.id,
                result,
                Some(classification.delta_winrate),
                Some(classification.delta_score),
                classification.is_brilliant,
                classification.is_mistake,
                classification.is_questionable,
            )
            .await?;

        self.refresh_rollup(&task.match_id, result).await
    }

    async fn save_unclassified(&self, task: &Task, result: &TaskResult) -> Result<()> {
        self.store.save_result(task.id, result, None, None, false, false, false).await?;
        self.refresh_rollup(&task.match_id, result).await
    }

    async fn refresh_rollup(&self, match_id: &MatchId, result: &TaskResult) -> Result<()> {
        self.store.update_engine_rollup(match_id, result.winrate, result.score_lead).await
    }
}
