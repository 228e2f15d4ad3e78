//! HTTP inspection API.
//!
//! A single read-only route: the paginated capacity-block listing. The
//! node mounts this router next to its other services; tests drive the
//! handler directly.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::chain::{poc_blocks, BlockSummarySource};
use crate::types::address_to_hex;

/// Hard cap on rows per page.
pub const MAX_PAGE_COUNT: u64 = 100;

fn default_count() -> u64 {
    20
}

#[derive(Clone)]
pub struct ApiState {
    pub chain: Arc<dyn BlockSummarySource>,
}

#[derive(Debug, Deserialize)]
pub struct PocBlocksQuery {
    /// Zero-based page, newest blocks first.
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_count")]
    pub count: u64,
}

/// GET /poc/blocks?page=&count=
async fn get_poc_blocks(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<PocBlocksQuery>,
) -> Json<serde_json::Value> {
    let count = query.count.min(MAX_PAGE_COUNT);
    let summaries = poc_blocks(&*state.chain, query.page, count);
    let rows: Vec<serde_json::Value> = summaries
        .iter()
        .map(|s| {
            json!({
                "coinbase": address_to_hex(&s.coinbase),
                "root": format!("0x{}", hex::encode(s.root)),
                "number": s.number,
                "time": s.time,
                "txCount": s.tx_count,
            })
        })
        .collect();
    Json(json!({
        "page": query.page,
        "count": count,
        "blocks": rows,
    }))
}

/// Build the capacity inspection router.
pub fn poc_api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/poc/blocks", get(get_poc_blocks))
        .with_state(state)
}
