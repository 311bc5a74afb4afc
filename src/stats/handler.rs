use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::HubError;
use crate::http::{map_error, require_admin, require_user, AppState, HandlerError};

use super::dto::{PluginStats, PluginUsageLog, StatsSummary, UsageLogCreate};

pub(crate) async fn log_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UsageLogCreate>,
) -> Result<(StatusCode, Json<PluginUsageLog>), HandlerError> {
    let user = require_user(&state, &headers)?;
    state.catalog().get(request.plugin_id).map_err(map_error)?;
    match state.stats().log_event(&user.user_id, request) {
        Ok(log) => Ok((StatusCode::CREATED, Json(log))),
        Err(err) => Err(map_error(err)),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SummaryParams {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

pub(crate) async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<StatsSummary>, HandlerError> {
    require_admin(&state, &headers)?;
    state.catalog().get(plugin_id).map_err(map_error)?;
    state
        .stats()
        .summary(plugin_id, params.days)
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RangeParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub(crate) async fn range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<PluginStats>>, HandlerError> {
    require_admin(&state, &headers)?;
    state.catalog().get(plugin_id).map_err(map_error)?;
    if params.start_date > params.end_date {
        return Err(map_error(HubError::invalid_input(
            "start_date must not be after end_date",
        )));
    }
    state
        .stats()
        .range(plugin_id, params.start_date, params.end_date)
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserEventParams {
    #[serde(default)]
    pub plugin_id: Option<u64>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_event_limit")]
    pub limit: usize,
}

fn default_event_limit() -> usize {
    100
}

pub(crate) async fn user_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UserEventParams>,
) -> Result<Json<Vec<PluginUsageLog>>, HandlerError> {
    let user = require_user(&state, &headers)?;
    state
        .stats()
        .user_events(&user.user_id, params.plugin_id, params.skip, params.limit)
        .map(Json)
        .map_err(map_error)
}
