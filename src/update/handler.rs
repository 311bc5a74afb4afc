use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::catalog::handler::parse_pipe_id;
use crate::http::{map_error, optional_user, AppState, HandlerError};

use super::dto::{BatchCheckRequest, BatchCheckResponse, CheckUpdateRequest, UpdateInfo};

pub(crate) async fn check_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckUpdateRequest>,
) -> Result<Json<UpdateInfo>, HandlerError> {
    let user = optional_user(&state, &headers);
    let plugin_id = parse_pipe_id(&request.pipe_id)?;
    state
        .checker()
        .check_one(plugin_id, &request.version, user.as_ref().map(|u| u.user_id.as_str()))
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn check_updates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchCheckRequest>,
) -> Json<BatchCheckResponse> {
    let user = optional_user(&state, &headers);
    let results = state
        .checker()
        .check_batch(&request.plugins, user.as_ref().map(|u| u.user_id.as_str()));
    Json(BatchCheckResponse { results })
}
