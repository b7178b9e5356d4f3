use axum::extract::{Path, Query, State};
use serde_json::{json, Value};

use super::Debugged;
use crate::api::format::{element_to_api_value, list_to_api_value, tree_to_api_value};
use crate::middleware::{ApiResponse, ApiResult};
use crate::params::RawParams;
use crate::services::{Listing, TreeService};
use crate::AppState;

/// GET /organizational-structure - drill-down tree, or a flat listing when
/// `filters` or `order_by` is given
pub async fn tree(State(state): State<AppState>, Query(params): Query<RawParams>) -> ApiResult<Value> {
    let debug = params.debug_mode();
    let selection = TreeService::selection(&params).debugged(debug)?;

    let nodes = match state.service.tree(&params).await.debugged(debug)? {
        Listing::Tree(tree) => json!([tree_to_api_value(&tree, &selection)]),
        Listing::Flat(rows) => list_to_api_value(&rows, &selection),
    };
    Ok(ApiResponse::success(json!({ "nodes": nodes })))
}

/// GET /organizational-structure/:id - one element with its subtree
pub async fn element(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RawParams>,
) -> ApiResult<Value> {
    let debug = params.debug_mode();
    let id = TreeService::node_id(&id).debugged(debug)?;
    let selection = TreeService::selection(&params).debugged(debug)?;

    let element = state.service.element(id).await.debugged(debug)?;
    let node = element_to_api_value(&element.tree, element.parent.as_ref(), &selection);
    Ok(ApiResponse::success(json!({ "node": node })))
}
