//! Port for the external match-listing API.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::enums::MatchStatus;
use crate::types::primitives::Coord;

/// The current situation of one live or finished match, as reported by the
/// listing source.
///
/// Move lists arrive in whatever encoding the source happens to use for that
/// match; by the time this struct is built, [`crate::listing::parse_move_list`]
/// has already normalized them to canonical GTP [`Coord`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSituation {
    /// Source-native id for the match (the `liveId` the listing API uses).
    pub source_id: String,
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
    /// Board size, if reported (defaults applied by the caller otherwise).
    pub board_size: Option<u8>,
    /// Komi, if reported.
    pub komi: Option<f64>,
    /// Ruleset tag, if reported.
    pub rules: Option<String>,
    /// Most recent engine rollup winrate the source itself may surface.
    pub rollup_winrate: Option<f64>,
    /// Most recent engine rollup score the source itself may surface.
    pub rollup_score_lead: Option<f64>,
    /// Round label, e.g. `"Round 3"`.
    pub round: Option<String>,
    /// Scheduled or actual date of play.
    pub date: Option<String>,
    /// Black player's rank.
    pub black_rank: Option<String>,
    /// White player's rank.
    pub white_rank: Option<String>,
    /// Final result string, once known.
    pub result: Option<String>,
}

/// Port for the read-only external match-listing HTTP API.
///
/// # Implementation Notes
///
/// Implementations should retry transient failures with exponential backoff
/// (start 1s, double on `429`, give up after a configured number of
/// attempts) and fail fast on non-`429` `4xx` responses. Per §7 of the
/// design, a polling cycle that cannot reach the listing API for one match
/// simply yields no new tasks for that match; it must never abort the whole
/// poll cycle.
#[async_trait]
pub trait ListingApiClient: Send + Sync {
    /// List every match the source currently considers live.
    ///
    /// # Errors
    ///
    /// Returns an error if the request ultimately fails after retries.
    async fn list_live_matches(&self) -> Result<Vec<String>>;

    /// Fetch the current situation (moves, status) of one match by its
    /// source-native id.
    ///
    /// Returns `Ok(None)` if the source has nothing for this id, a terminal
    /// condition distinct from a transport failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the request ultimately fails after retries.
    async fn get_situation(&self, source_id: &str) -> Result<Option<MatchSituation>>;
}
