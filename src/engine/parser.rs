//! Result Parser (§4.4): turns one engine HTTP response body into a parsed
//! [`AnalysisResult`], independent of the transport that fetched it.
//!
//! Kept separate from [`super::HttpEngineClient`] so the parsing rules -
//! defaults, the top-10 candidate cap, and ownership reshaping - can be unit
//! tested against literal JSON without a mock server.

use serde::Deserialize;

use crate::ports::AnalysisResult;
use crate::types::entities::CandidateMove;
use crate::types::primitives::Coord;

/// Maximum number of candidate moves kept from `moveInfos`, most-visited
/// first as the engine already orders them.
const MAX_CANDIDATE_MOVES: usize = 10;

/// Raw shape of the engine's analysis response (§6).
#[derive(Debug, Deserialize)]
pub struct EngineResponseDto {
    /// Present iff the engine could not analyze this position.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "rootInfo")]
    pub root_info: Option<RootInfoDto>,
    #[serde(default, rename = "moveInfos")]
    pub move_infos: Vec<MoveInfoDto>,
    #[serde(default)]
    pub ownership: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct RootInfoDto {
    #[serde(default)]
    pub winrate: Option<f64>,
    #[serde(default, rename = "scoreLead")]
    pub score_lead: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct MoveInfoDto {
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(default)]
    pub visits: u32,
    #[serde(default)]
    pub winrate: f64,
    #[serde(default, rename = "scoreLead")]
    pub score_lead: f64,
    #[serde(default)]
    pub prior: f64,
    #[serde(default)]
    pub pv: Vec<String>,
}

/// Default winrate used when `rootInfo.winrate` is absent (§4.4).
const DEFAULT_WINRATE: f64 = 0.5;
/// Default score lead used when `rootInfo.scoreLead` is absent (§4.4).
const DEFAULT_SCORE_LEAD: f64 = 0.0;

/// Parse one engine response body.
///
/// Returns `Ok(None)` if the response carries an `error` field - the caller
/// treats this as a failed attempt (§7), not a parse error. Malformed
/// candidate-move coordinates are skipped rather than failing the whole
/// response, since a position can still be scored from `rootInfo` alone.
#[must_use]
pub fn parse(response: &EngineResponseDto, board_size: u8) -> Option<AnalysisResult> {
    if response.error.is_some() {
        return None;
    }

    let winrate = response
        .root_info
        .as_ref()
        .and_then(|r| r.winrate)
        .unwrap_or(DEFAULT_WINRATE);
    let score_lead = response
        .root_info
        .as_ref()
        .and_then(|r| r.score_lead)
        .unwrap_or(DEFAULT_SCORE_LEAD);

    let top_moves = response
        .move_infos
        .iter()
        .take(MAX_CANDIDATE_MOVES)
        .filter_map(|mi| {
            Coord::new(mi.mv.clone()).ok().map(|coord| CandidateMove {
                coord,
                winrate: mi.winrate,
                score_lead: mi.score_lead,
                visits: mi.visits,
                prior: mi.prior,
                principal_variation: mi.pv.iter().filter_map(|c| Coord::new(c.clone()).ok()).collect(),
            })
        })
        .collect();

    let ownership = reshape_ownership(response.ownership.as_deref(), board_size);

    Some(AnalysisResult {
        winrate,
        score_lead,
        top_moves,
        ownership,
    })
}

/// Reshape a flat `ownership` array into the canonical row-major grid if its
/// length matches `board_size^2`; otherwise omit it (§4.4).
///
/// The grid is already row-major in the engine's wire format, so "reshaping"
/// here is really just a length check - kept as a distinct step because the
/// spec calls it out as one, and because future board-size validation hooks
/// in here.
fn reshape_ownership(flat: Option<&[f64]>, board_size: u8) -> Option<Vec<f64>> {
    let flat = flat?;
    let expected = usize::from(board_size) * usize::from(board_size);
    if flat.len() == expected {
        Some(flat.to_vec())
    } else {
        None
    }
}
