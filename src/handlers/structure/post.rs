use axum::extract::{Query, State};
use serde_json::{json, Value};

use super::Debugged;
use crate::api::format::node_to_api_value;
use crate::middleware::{ApiResponse, ApiResult};
use crate::params::RawParams;
use crate::services::TreeService;
use crate::AppState;

/// POST /organizational-structure - create an element (`type`, `parent`, `name`, policy flags)
pub async fn post(State(state): State<AppState>, Query(params): Query<RawParams>) -> ApiResult<Value> {
    let debug = params.debug_mode();
    let selection = TreeService::selection(&params).debugged(debug)?;

    let created = state.service.create(&params).await.debugged(debug)?;
    let message = format!("Successfully created element «{}»", created.node.name);
    let node = node_to_api_value(&created.node, created.parent.as_ref(), &selection);

    Ok(ApiResponse::created(json!({ "node": node })).message(message))
}
