use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;

use crate::error::HubError;
use crate::http::{
    map_error, optional_user, require_admin, require_user, AppState, HandlerError, PageParams,
};
use crate::stats::{PluginEventType, UsageLogCreate};

use super::dto::{
    DownloadDescriptor, DownloadPluginRequest, Plugin, PluginCreate, PluginUpdate, PluginVersion,
    PluginVisibility, RegistryEntry, VersionUpload,
};

pub(crate) async fn create_plugin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PluginCreate>,
) -> Result<(StatusCode, Json<Plugin>), HandlerError> {
    require_admin(&state, &headers)?;
    match state.catalog().create(request) {
        Ok(plugin) => Ok((StatusCode::CREATED, Json(plugin))),
        Err(err) => Err(map_error(err)),
    }
}

pub(crate) async fn list_plugins(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<Plugin>>, HandlerError> {
    require_admin(&state, &headers)?;
    state
        .catalog()
        .list(page.skip, page.limit)
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn get_plugin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
) -> Result<Json<Plugin>, HandlerError> {
    require_admin(&state, &headers)?;
    state.catalog().get(plugin_id).map(Json).map_err(map_error)
}

pub(crate) async fn update_plugin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
    Json(request): Json<PluginUpdate>,
) -> Result<Json<Plugin>, HandlerError> {
    require_admin(&state, &headers)?;
    state
        .catalog()
        .update(plugin_id, request)
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn delete_plugin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&state, &headers)?;
    match state.catalog().delete(state.licenses(), plugin_id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(map_error(err)),
    }
}

pub(crate) async fn upload_version(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
    Json(request): Json<VersionUpload>,
) -> Result<(StatusCode, Json<PluginVersion>), HandlerError> {
    require_admin(&state, &headers)?;
    let artifact = base64::engine::general_purpose::STANDARD
        .decode(&request.file_data)
        .map_err(|_| map_error(HubError::invalid_input("Invalid base64 file data")))?;
    match state.catalog().add_version(plugin_id, request.data, &artifact) {
        Ok(version) => Ok((StatusCode::CREATED, Json(version))),
        Err(err) => Err(map_error(err)),
    }
}

pub(crate) async fn list_versions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(plugin_id): Path<u64>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<PluginVersion>>, HandlerError> {
    require_admin(&state, &headers)?;
    state
        .catalog()
        .versions(plugin_id, page.skip, page.limit)
        .map(Json)
        .map_err(map_error)
}

pub(crate) async fn delete_version(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((plugin_id, version)): Path<(u64, String)>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&state, &headers)?;
    let found = state
        .catalog()
        .version_by_string(plugin_id, &version)
        .map_err(map_error)?
        .ok_or_else(|| map_error(HubError::version_not_found(&version)))?;
    match state.catalog().delete_version(plugin_id, found.id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(map_error(err)),
    }
}

/// Public plugins plus, for an authenticated caller, their licensed private
/// plugins.
pub(crate) async fn registry(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RegistryEntry>>, HandlerError> {
    let user = optional_user(&state, &headers);

    let mut plugins = state.catalog().list_public().map_err(map_error)?;
    if let Some(ref user) = user {
        let licensed = state
            .catalog()
            .list_licensed(state.licenses(), &user.user_id)
            .map_err(map_error)?;
        for plugin in licensed {
            if !plugins.iter().any(|p| p.id == plugin.id) {
                plugins.push(plugin);
            }
        }
    }

    let mut entries = Vec::with_capacity(plugins.len());
    for plugin in plugins {
        let purchased = match user {
            Some(ref user) => state
                .licenses()
                .has_valid_license(&user.user_id, plugin.id)
                .map_err(map_error)?,
            None => false,
        };
        let latest = state
            .catalog()
            .latest_version(plugin.id)
            .map_err(map_error)?;
        entries.push(RegistryEntry {
            id: plugin.id.to_string(),
            name: plugin.name,
            description: plugin.description,
            is_paid: plugin.visibility == PluginVisibility::Private && !purchased,
            status: plugin.status,
            created_at: plugin.created_at,
            latest_version: latest.map(|v| v.version),
            downloads_count: plugin.downloads_count,
        });
    }
    Ok(Json(entries))
}

/// Resolves the latest version of a licensed plugin into a download
/// descriptor and bumps the download counters.
pub(crate) async fn download_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DownloadPluginRequest>,
) -> Result<Json<DownloadDescriptor>, HandlerError> {
    let user = require_user(&state, &headers)?;
    let plugin_id = parse_pipe_id(&request.pipe_id)?;
    let plugin = state.catalog().get(plugin_id).map_err(map_error)?;

    if plugin.visibility == PluginVisibility::Private {
        let has_license = state
            .licenses()
            .has_valid_license(&user.user_id, plugin_id)
            .map_err(map_error)?;
        if !has_license {
            return Err(map_error(HubError::permission_denied(
                "You need to purchase this plugin first",
            )));
        }
    }

    let latest = state
        .catalog()
        .latest_version(plugin_id)
        .map_err(map_error)?
        .ok_or_else(|| map_error(HubError::version_not_found("no versions available")))?;

    state.catalog().increment_downloads(plugin_id, latest.id);
    state.stats().record_download(plugin_id);

    Ok(Json(DownloadDescriptor {
        download_url: state.checker().download_url(plugin_id, &latest.version),
        file_hash: latest.zip_hash,
        file_size: latest.zip_size,
    }))
}

/// Binary artifact stream. Counting and the install event are best-effort
/// side effects; a failure there never blocks the response.
pub(crate) async fn download_artifact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((plugin_id, version)): Path<(u64, String)>,
) -> Result<impl IntoResponse, HandlerError> {
    let user = optional_user(&state, &headers);
    let plugin = state.catalog().get(plugin_id).map_err(map_error)?;

    if plugin.visibility == PluginVisibility::Private {
        let Some(ref user) = user else {
            return Err(map_error(HubError::Unauthenticated));
        };
        let has_license = state
            .licenses()
            .has_valid_license(&user.user_id, plugin_id)
            .map_err(map_error)?;
        if !has_license {
            return Err(map_error(HubError::permission_denied(
                "You don't have permission to download this plugin",
            )));
        }
    }

    let found = state
        .catalog()
        .version_by_string(plugin_id, &version)
        .map_err(map_error)?
        .ok_or_else(|| map_error(HubError::version_not_found(&version)))?;

    let bytes = state.catalog().artifact_bytes(&found).map_err(map_error)?;

    state.catalog().increment_downloads(plugin_id, found.id);
    state.stats().record_download(plugin_id);
    if let Some(ref user) = user {
        let log = UsageLogCreate {
            plugin_id,
            event_type: PluginEventType::Install,
            version: Some(found.version.clone()),
            machine_id: None,
        };
        if let Err(err) = state.stats().log_event(&user.user_id, log) {
            tracing::warn!("Failed to log install event: {}", err);
        }
    }

    let file_name = found.file_name;
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, bytes))
}

pub(crate) fn parse_pipe_id(pipe_id: &str) -> Result<u64, HandlerError> {
    pipe_id
        .parse::<u64>()
        .map_err(|_| map_error(HubError::invalid_input(format!("Invalid plugin id: {}", pipe_id))))
}
