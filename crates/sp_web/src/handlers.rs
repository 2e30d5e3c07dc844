use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub queued_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

fn error_response(e: sp_core::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// GET / - one ingestion pass over every watchlist
pub async fn run_pipeline(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.run().await {
        Ok(summary) => {
            info!(queued = summary.queued_count, "Pipeline run triggered over HTTP");
            Json(RunResponse {
                queued_count: summary.queued_count,
            })
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "Pipeline run failed");
            error_response(e)
        }
    }
}

/// GET /api/search?q= - ticker lookup with live quotes
pub async fn search_tickers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.tickers.search_tickers(&params.q).await {
        Ok(quotes) => Json(quotes).into_response(),
        Err(e) => {
            error!(query = %params.q, error = %e, "Ticker search failed");
            error_response(e)
        }
    }
}
