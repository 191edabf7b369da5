//! Domain entities for database persistence.
//!
//! These structs represent the core domain objects the dispatcher operates on:
//! tracked matches, their moves, and the per-position analysis tasks queued
//! against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{MatchStatus, Player, TaskStatus};
use super::primitives::{Coord, MatchId, MoveNumber, Priority};

// ═══════════════════════════════════════════════════════════════════════════════
// MATCH
// ═══════════════════════════════════════════════════════════════════════════════

/// A tracked Go match, as reconciled from the listing source's move feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Opaque identifier from the listing source.
    pub match_id: MatchId,
    /// Tournament or event name, if known.
    pub tournament: Option<String>,
    /// Black player's name.
    pub black_name: String,
    /// White player's name.
    pub white_name: String,
    /// `live` while moves may still arrive, `finished` once play has concluded.
    pub status: MatchStatus,
    /// Canonical GTP coordinates for every move played so far, in order.
    pub moves: Vec<Coord>,
    /// Board size (9, 13, or 19 in practice; stored generically).
    pub board_size: u8,
    /// Komi, e.g. `7.5`.
    pub komi: f64,
    /// Ruleset string as reported by the listing source, e.g. `"chinese"`.
    pub rules: String,
    /// Most recent engine-reported winrate from Black's perspective, if any
    /// position in this match has been analyzed.
    pub rollup_winrate: Option<f64>,
    /// Most recent engine-reported score lead from Black's perspective.
    pub rollup_score_lead: Option<f64>,
    /// Round label, e.g. `"Round 3"`.
    pub round: Option<String>,
    /// Scheduled or actual date of play.
    pub date: Option<String>,
    /// Black player's rank, e.g. `"9d"`.
    pub black_rank: Option<String>,
    /// White player's rank.
    pub white_rank: Option<String>,
    /// Final result string, e.g. `"B+R"`, once the match has finished.
    pub result: Option<String>,
    /// When this match was first seen.
    pub created_at: DateTime<Utc>,
    /// When this match's row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// The position index of the last move played (0 if no moves yet).
    #[must_use]
    pub fn latest_move_number(&self) -> MoveNumber {
        MoveNumber::new(u32::try_from(self.moves.len()).unwrap_or(u32::MAX))
    }

    /// Whether the match is still being played.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self.status, MatchStatus::Live)
    }

    /// The side to move at a given 0-based move index (the player who made the
    /// move that produced position `move_number`).
    ///
    /// Black always plays move 1 (the first stone), so the mover for position
    /// `n` (n >= 1) is Black when `n` is odd.
    #[must_use]
    pub const fn mover_at(move_number: MoveNumber) -> Player {
        if move_number.value() % 2 == 1 {
            Player::Black
        } else {
            Player::White
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYSIS TASK
// ═══════════════════════════════════════════════════════════════════════════════

/// A single candidate move returned by the engine for a position, ranked by
/// visit count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMove {
    /// The move's GTP coordinate.
    pub coord: Coord,
    /// Winrate for Black if this move is played.
    pub winrate: f64,
    /// Score lead for Black if this move is played.
    pub score_lead: f64,
    /// Number of playouts the engine spent evaluating this move.
    pub visits: u32,
    /// Engine's prior probability for this move before search.
    pub prior: f64,
    /// Principal variation starting with this move, in GTP coordinates.
    pub principal_variation: Vec<Coord>,
}

/// Per-position ownership estimate: one value per board intersection in
/// row-major order, each in `[-1.0, 1.0]` (positive favors Black).
pub type Ownership = Vec<f64>;

/// An analysis request for one position within one match, and the engine's
/// result once it has been processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Surrogate primary key.
    pub id: i64,
    /// The match this position belongs to.
    pub match_id: MatchId,
    /// The position index within the match (0 = empty board).
    pub move_number: MoveNumber,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Current scheduling priority; may be escalated after creation.
    pub priority: Priority,
    /// The move actually played to reach this position, if `move_number > 0`.
    pub actual_move: Option<Coord>,
    /// The side that played `actual_move`.
    pub actual_player: Option<Player>,
    /// Engine-reported winrate for Black at the root of this position.
    pub winrate: Option<f64>,
    /// Engine-reported score lead for Black at the root of this position.
    pub score_lead: Option<f64>,
    /// Top engine-ranked candidate moves, most-visited first.
    pub top_moves: Option<Vec<CandidateMove>>,
    /// Per-intersection ownership estimate.
    pub ownership: Option<Ownership>,
    /// Winrate swing versus the previous position in the same match.
    pub delta_winrate: Option<f64>,
    /// Score-lead swing versus the previous position in the same match.
    pub delta_score: Option<f64>,
    /// Whether `delta_score` exceeded the brilliant-move threshold.
    pub is_brilliant: bool,
    /// Whether `delta_score` fell below the mistake threshold.
    pub is_mistake: bool,
    /// Whether `delta_score` fell in the questionable-move band.
    pub is_questionable: bool,
    /// Error message from the most recent failed attempt, if any.
    pub error_message: Option<String>,
    /// Number of attempts made so far.
    pub retry_count: u32,
    /// When this task was first created.
    pub created_at: DateTime<Utc>,
    /// When this task last completed successfully.
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether this task is eligible to be picked up by a worker.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Pending)
    }

    /// Whether this task has a usable engine result.
    #[must_use]
    pub const fn has_result(&self) -> bool {
        matches!(self.status, TaskStatus::Success)
    }

    /// Whether classification flags were set on this task's result.
    #[must_use]
    pub const fn has_classification(&self) -> bool {
        self.delta_score.is_some()
    }
}
