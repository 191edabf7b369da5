//! Port for the analysis engine's HTTP interface.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::entities::{CandidateMove, Ownership};
use crate::types::enums::Player;

/// One move in the sequence sent to the engine, in play order.
#[derive(Debug, Clone)]
pub struct EngineMove {
    /// Which side played the move.
    pub player: Player,
    /// GTP coordinate of the move.
    pub coord: String,
}

/// Parameters for a single analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Unique id echoed back by the engine, used to correlate the response.
    pub request_id: String,
    /// Full move sequence up to and including the position to analyze.
    pub moves: Vec<EngineMove>,
    /// Ruleset, e.g. `"chinese"`.
    pub rules: String,
    /// Komi.
    pub komi: f64,
    /// Board size.
    pub board_size: u8,
    /// Search depth cap.
    pub max_visits: u32,
    /// Dispatch priority, passed through to the engine for its own scheduling.
    pub priority: i32,
}

/// A parsed, successful analysis result.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Winrate for Black at the root.
    pub winrate: f64,
    /// Score lead for Black at the root.
    pub score_lead: f64,
    /// Top engine-ranked candidate moves.
    pub top_moves: Vec<CandidateMove>,
    /// Per-intersection ownership estimate, if requested and returned.
    pub ownership: Option<Ownership>,
}

/// Port for the analysis engine's HTTP interface.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Pin `overrideSettings.reportAnalysisWinratesAs` to `BLACK` so winrate and
///   score are always comparable across positions regardless of whose turn it
///   is
/// - Treat an `error` field in the engine's response the same as a transient
///   transport failure: it counts against the task's retry budget (§7)
///   rather than failing the task outright
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Send a single position for analysis and return the parsed result.
    ///
    /// Returns `Ok(None)` if the engine reported an analysis error for this
    /// position; the caller treats this the same as a transient failure and
    /// counts it against the task's retry budget (§7). Returns `Err` for
    /// transport-level failures, which are handled identically by the
    /// dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the response cannot
    /// be parsed.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Option<AnalysisResult>>;

    /// Check whether the engine is reachable.
    async fn health_check(&self) -> bool;
}
