use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;

use crate::catalog::handler::parse_pipe_id;
use crate::error::HubError;
use crate::http::{
    map_error, require_admin, require_user, AppState, HandlerError, PageParams,
};

use super::dto::{
    HasLicenseParams, HasLicenseResponse, LicenseCreate, LicenseUpdate, PluginLicense,
    PurchaseRequest, VerifyOutcome, VerifyRequest,
};

pub(crate) async fn issue_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LicenseCreate>,
) -> Result<(StatusCode, Json<PluginLicense>), HandlerError> {
    require_admin(&state, &headers)?;
    // Reject licenses for plugins that do not exist
    state.catalog().get(request.plugin_id).map_err(map_error)?;
    match state.licenses().issue(request) {
        Ok(license) => Ok((StatusCode::CREATED, Json(license))),
        Err(err) => Err(map_error(err)),
    }
}

pub(crate) async fn list_user_licenses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<PluginLicense>>, HandlerError> {
    require_admin(&state, &headers)?;
    state
        .licenses()
        .list_for_user(&user_id, page.skip, page.limit)
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn list_plugin_licenses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<PluginLicense>>, HandlerError> {
    require_admin(&state, &headers)?;
    state
        .licenses()
        .list_for_plugin(plugin_id, page.skip, page.limit)
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn update_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(license_id): Path<u64>,
    Json(request): Json<LicenseUpdate>,
) -> Result<Json<PluginLicense>, HandlerError> {
    require_admin(&state, &headers)?;
    state
        .licenses()
        .update(license_id, request)
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn revoke_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(license_id): Path<u64>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&state, &headers)?;
    match state.licenses().revoke(license_id) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(map_error(HubError::license_not_found(license_id))),
        Err(err) => Err(map_error(err)),
    }
}

/// Public verification query: always 200, validity carried in the body.
pub(crate) async fn verify_license(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyOutcome>, HandlerError> {
    state
        .licenses()
        .verify(
            &request.license_key,
            request.plugin_id,
            request.machine_id.as_deref(),
        )
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn has_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HasLicenseParams>,
) -> Result<Json<HasLicenseResponse>, HandlerError> {
    let user = require_user(&state, &headers)?;
    state
        .licenses()
        .has_valid_license(&user.user_id, params.plugin_id)
        .map(|has_license| Json(HasLicenseResponse { has_license }))
        .map_err(map_error)
}

/// Purchase protocol: check first, then issue. A repeated purchase returns
/// "already purchased" instead of a second usable license.
pub(crate) async fn purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let user = require_user(&state, &headers)?;
    let plugin_id = parse_pipe_id(&request.pipe_id)?;
    state.catalog().get(plugin_id).map_err(map_error)?;

    let already = state
        .licenses()
        .has_valid_license(&user.user_id, plugin_id)
        .map_err(map_error)?;
    if already {
        return Ok(Json(json!({ "data": { "already_purchased": true } })));
    }

    state
        .licenses()
        .issue(LicenseCreate {
            user_id: user.user_id,
            plugin_id,
            // perpetual license
            expires_at: None,
            machine_id: None,
        })
        .map_err(map_error)?;

    Ok(Json(json!({ "data": { "payment_successful": true } })))
}
