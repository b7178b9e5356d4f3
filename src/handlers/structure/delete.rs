use axum::extract::{Path, Query, State};
use serde_json::{json, Value};

use super::Debugged;
use crate::api::STRUCTURE_PATH;
use crate::middleware::{ApiResponse, ApiResult};
use crate::params::RawParams;
use crate::services::TreeService;
use crate::AppState;

/// DELETE /organizational-structure/:id - `recursive=true` removes the whole subtree,
/// otherwise the children move up to the element's parent
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RawParams>,
) -> ApiResult<Value> {
    let debug = params.debug_mode();
    let id = TreeService::node_id(&id).debugged(debug)?;

    let outcome = state.service.delete(id, &params).await.debugged(debug)?;
    let message = format!("Successfully deleted element «{}»", outcome.name);

    Ok(ApiResponse::success(json!({
        "links": { "collection": STRUCTURE_PATH },
        "removed": outcome.removed,
        "reparented": outcome.reparented,
    }))
    .message(message))
}
