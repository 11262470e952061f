//! Lip reading history endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::vision::LipReadingResult;

const DEFAULT_COUNT: usize = 10;

/// Build lip reading router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/history", get(history))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    count: Option<usize>,
}

/// Recent results, oldest first
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub enabled: bool,
    pub results: Vec<LipReadingResult>,
}

async fn history(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let count = query.count.unwrap_or(DEFAULT_COUNT);
    Json(HistoryResponse {
        enabled: state.lip_analyzer.is_some(),
        results: state.lip_history.recent(count),
    })
}
