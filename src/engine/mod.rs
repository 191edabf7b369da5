//! HTTP client for the external Go-analysis engine (§6, outbound).
//!
//! This is the only adapter that knows the engine's wire format; everything
//! above [`HttpEngineClient`] talks in terms of [`crate::ports::engine`]
//! types. Timeouts and preemption-cancellation are **not** handled here -
//! per §9, the dispatcher spawns each [`EngineClient::analyze`] call as its
//! own task and races it against a timer and a cancellation signal, so it
//! can tell the three outcomes apart. This client only ever returns success,
//! an engine-reported analysis error, or a transport error.

mod parser;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::error::{InfraError, Result};
use crate::ports::{AnalysisRequest, AnalysisResult, EngineClient};

pub use parser::{parse, EngineResponseDto};

/// `HTTP` client for the engine's analysis endpoint.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    client: Client,
    base_url: String,
    analyze_path: String,
    health_path: String,
}

impl HttpEngineClient {
    /// Build a client against the engine's base URL.
    ///
    /// `analyze_path` and `health_path` default to `/analyze` and `/health`
    /// if empty, matching the teaching engine's layout; real deployments
    /// override both via configuration.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            analyze_path: "/analyze".to_string(),
            health_path: "/health".to_string(),
        }
    }

    /// Override the analyze endpoint path.
    #[must_use]
    pub fn with_analyze_path(mut self, path: impl Into<String>) -> Self {
        self.analyze_path = path.into();
        self
    }

    /// Override the health-check endpoint path.
    #[must_use]
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    fn analyze_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.analyze_path)
    }

    fn health_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.health_path)
    }
}

/// Wire body sent to the engine (§6). Field names are contractual.
#[derive(Debug, Serialize)]
struct AnalyzeRequestBody {
    id: String,
    rules: String,
    komi: f64,
    #[serde(rename = "boardXSize")]
    board_x_size: u8,
    #[serde(rename = "boardYSize")]
    board_y_size: u8,
    #[serde(rename = "maxVisits")]
    max_visits: u32,
    moves: Vec<[String; 2]>,
    #[serde(rename = "analyzeTurns")]
    analyze_turns: [usize; 1],
    #[serde(rename = "includeOwnership")]
    include_ownership: bool,
    #[serde(rename = "includePolicy")]
    include_policy: bool,
    #[serde(rename = "overrideSettings")]
    override_settings: serde_json::Value,
    priority: i32,
}

impl From<&AnalysisRequest> for AnalyzeRequestBody {
    fn from(req: &AnalysisRequest) -> Self {
        let move_count = req.moves.len();
        Self {
            id: req.request_id.clone(),
            rules: req.rules.clone(),
            komi: req.komi,
            board_x_size: req.board_size,
            board_y_size: req.board_size,
            max_visits: req.max_visits,
            moves: req
                .moves
                .iter()
                .map(|m| [m.player.letter().to_string(), m.coord.clone()])
                .collect(),
            analyze_turns: [move_count],
            include_ownership: true,
            include_policy: true,
            // Pinned per §6: winrate/score are always reported from Black's
            // perspective regardless of whose move produced the position.
            override_settings: json!({ "reportAnalysisWinratesAs": "BLACK" }),
            priority: req.priority,
        }
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Option<AnalysisResult>> {
        let body = AnalyzeRequestBody::from(request);

        let response = self
            .client
            .post(self.analyze_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| InfraError::Engine(Box::new(e)))?
            .error_for_status()
            .map_err(|e| InfraError::Engine(Box::new(e)))?;

        let dto: EngineResponseDto = response
            .json()
            .await
            .map_err(|e| InfraError::Engine(Box::new(e)))?;

        Ok(parse(&dto, request.board_size))
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.health_url()).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "engine health check failed");
                false
            }
        }
    }
}
