use axum::extract::{Path, Query, State};
use serde_json::{json, Value};

use super::Debugged;
use crate::api::format::links;
use crate::middleware::{ApiResponse, ApiResult};
use crate::params::RawParams;
use crate::services::TreeService;
use crate::AppState;

/// PUT /organizational-structure/:id - rename, retype, or move with one of
/// `parent`, `before`, `after`
pub async fn put(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RawParams>,
) -> ApiResult<Value> {
    let debug = params.debug_mode();
    let id = TreeService::node_id(&id).debugged(debug)?;

    let outcome = state.service.update(id, &params).await.debugged(debug)?;
    let body = json!({ "links": links(&outcome.node) });

    if outcome.changed {
        let message = format!("Successfully updated element «{}»", outcome.previous_name);
        return Ok(ApiResponse::success(body).message(message));
    }

    let message = format!(
        "Item «{}» is stay unchanged by one of the reasons: 1. you did not submit data \
         2. submitted data is the same as old 3. element information update is not allowed",
        outcome.previous_name
    );
    Ok(ApiResponse::success(body).message(message).reporting(304))
}
