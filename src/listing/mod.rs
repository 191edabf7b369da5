//! HTTP client for the external match-listing API (§6, inbound).
//!
//! The listing API's exact JSON shape is explicitly underspecified (§6):
//! top-level payloads may be a bare array or an object wrapping the array
//! under `data`/`matches`/`content`/`list`, and a match descriptor may be
//! flat or nested under `liveMatch`. [`unwrap_array`] and [`lenient_field`]
//! below absorb that variance so the rest of the core only ever sees a
//! [`MatchSituation`].

mod moves;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{InfraError, Result};
use crate::ports::{ListingApiClient, MatchSituation};
use crate::types::enums::MatchStatus;

pub use moves::parse_move_list;

/// `HTTP` client for the match-listing API.
#[derive(Debug, Clone)]
pub struct HttpListingApiClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpListingApiClient {
    /// Build a client against the listing API's base URL.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            max_retries,
            initial_backoff,
        }
    }

    fn live_url(&self) -> String {
        format!("{}/live", self.base_url.trim_end_matches('/'))
    }

    fn situation_url(&self, source_id: &str) -> String {
        format!("{}/situation/{source_id}", self.base_url.trim_end_matches('/'))
    }

    /// `GET` with the retry/backoff policy from §7: double the backoff on
    /// `429`, retry up to `max_retries` times on `5xx`/network errors with
    /// exponential backoff starting at `initial_backoff`, and fail
    /// immediately on any other `4xx`.
    async fn get_with_retry(&self, url: &str) -> Result<Option<Value>> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            let outcome = self.client.get(url).send().await;
            match outcome {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.json::<Value>().await.map_err(|e| InfraError::ListingApi(Box::new(e)))?;
                    return Ok(Some(body));
                }
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    backoff *= 2;
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(InfraError::ListingApi(format!("rate limited after {attempt} attempts").into()).into());
                    }
                    warn!(url, attempt, backoff_ms = backoff.as_millis(), "listing API rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(InfraError::ListingApi(format!("server error after {attempt} attempts: {}", resp.status()).into()).into());
                    }
                    warn!(url, attempt, status = %resp.status(), "listing API server error, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Ok(resp) => {
                    // Any other 4xx: fail immediately, no retry (§7).
                    return Err(InfraError::ListingApi(format!("listing API returned {}", resp.status()).into()).into());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(InfraError::ListingApi(Box::new(e)).into());
                    }
                    warn!(url, attempt, error = %e, "listing API network error, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

/// Unwrap a top-level listing payload that may be a bare array or an object
/// wrapping the array under one of a few conventional keys (§6).
fn unwrap_array(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(_) => ["data", "matches", "content", "list"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Unwrap a single match descriptor that may be flat or nested under
/// `liveMatch` (§6).
fn unwrap_descriptor(raw: &Value) -> &Value {
    raw.get("liveMatch").unwrap_or(raw)
}

/// Read a string field from the first of several candidate keys present.
fn lenient_field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

/// Read a player's display name, checking both a flat `<side>Name` key and a
/// nested `<side>: { name }` object.
fn lenient_player_name(obj: &Value, side: &str, flat_key: &str) -> Option<String> {
    if let Some(name) = obj.get(flat_key).and_then(Value::as_str) {
        return Some(name.to_string());
    }
    obj.get(side)
        .and_then(|v| v.get("name").and_then(Value::as_str).or_else(|| v.as_str()))
        .map(ToString::to_string)
}

fn lenient_player_rank(obj: &Value, side: &str, flat_key: &str) -> Option<String> {
    if let Some(rank) = obj.get(flat_key).and_then(Value::as_str) {
        return Some(rank.to_string());
    }
    obj.get(side)
        .and_then(|v| v.get("rank"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Parse one match descriptor into a [`MatchSituation`], applying the board
/// size/komi/rules defaults from §3 when the source omits them.
///
/// Returns `None` if a required field (`liveId`, black/white player) is
/// missing, per §6's "missing required fields -> match descriptor
/// discarded" rule - this is not an error, just a skip. A malformed move
/// encoding is likewise not fatal to the whole descriptor (§4.3): it falls
/// back to an empty move list rather than discarding the match.
fn parse_descriptor(raw: &Value) -> Option<MatchSituation> {
    let obj = unwrap_descriptor(raw);

    let Some(source_id) = lenient_field(obj, &["liveId", "id"]) else {
        debug!("discarding match descriptor missing liveId");
        return None;
    };
    let Some(black_name) = lenient_player_name(obj, "black", "blackName") else {
        debug!(source_id, "discarding match descriptor missing black player");
        return None;
    };
    let Some(white_name) = lenient_player_name(obj, "white", "whiteName") else {
        debug!(source_id, "discarding match descriptor missing white player");
        return None;
    };

    let status = lenient_field(obj, &["status"])
        .and_then(|s| MatchStatus::try_from(s.to_ascii_lowercase().as_str()).ok())
        .unwrap_or(MatchStatus::Live);

    let board_size = obj
        .get("boardSize")
        .and_then(Value::as_u64)
        .and_then(|n| u8::try_from(n).ok());

    // A malformed move encoding must not sink the whole descriptor (§4.3,
    // §6): fall back to an empty move list and let the next poll cycle pick
    // up whatever the source corrects.
    let moves = match obj.get("moves").or_else(|| obj.get("moveList")) {
        Some(raw_moves) => moves::parse_move_list(raw_moves, board_size.unwrap_or(19)).unwrap_or_else(|e| {
            warn!(source_id, error = %e, "failed to parse move list, treating as empty");
            Vec::new()
        }),
        None => Vec::new(),
    };

    Some(MatchSituation {
        source_id: source_id.to_string(),
        tournament: lenient_field(obj, &["tournament", "eventName"]).map(ToString::to_string),
        black_name,
        white_name,
        status,
        moves,
        board_size,
        komi: obj.get("komi").and_then(Value::as_f64),
        rules: lenient_field(obj, &["rules"]).map(ToString::to_string),
        rollup_winrate: obj.get("winrate").and_then(Value::as_f64),
        rollup_score_lead: lenient_field_f64(obj, &["scoreLead", "score"]),
        round: lenient_field(obj, &["round"]).map(ToString::to_string),
        date: lenient_field(obj, &["date"]).map(ToString::to_string),
        black_rank: lenient_player_rank(obj, "black", "blackRank"),
        white_rank: lenient_player_rank(obj, "white", "whiteRank"),
        result: lenient_field(obj, &["result"]).map(ToString::to_string),
    })
}

fn lenient_field_f64(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_f64))
}

#[async_trait]
impl ListingApiClient for HttpListingApiClient {
    async fn list_live_matches(&self) -> Result<Vec<String>> {
        let Some(body) = self.get_with_retry(&self.live_url()).await? else {
            return Ok(Vec::new());
        };

        let ids = unwrap_array(&body)
            .iter()
            .filter_map(parse_descriptor)
            .map(|s| s.source_id)
            .collect();
        Ok(ids)
    }

    async fn get_situation(&self, source_id: &str) -> Result<Option<MatchSituation>> {
        let Some(body) = self.get_with_retry(&self.situation_url(source_id)).await? else {
            return Ok(None);
        };

        let descriptor = match &body {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        Ok(parse_descriptor(&descriptor))
    }
}
