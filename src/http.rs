use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{HubAuth, UserIdentity};
use crate::catalog::{self, PluginCatalog};
use crate::error::HubError;
use crate::license::{self, LicenseStore};
use crate::stats::{self, StatsAggregator};
use crate::update::{self, UpdateChecker};

#[derive(Clone)]
pub struct AppState {
    catalog: Arc<PluginCatalog>,
    licenses: Arc<LicenseStore>,
    stats: Arc<StatsAggregator>,
    checker: Arc<UpdateChecker>,
    auth: Arc<HubAuth>,
}

impl AppState {
    pub fn new(
        catalog: Arc<PluginCatalog>,
        licenses: Arc<LicenseStore>,
        stats: Arc<StatsAggregator>,
        checker: Arc<UpdateChecker>,
        auth: Arc<HubAuth>,
    ) -> Self {
        Self {
            catalog,
            licenses,
            stats,
            checker,
            auth,
        }
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn licenses(&self) -> &LicenseStore {
        &self.licenses
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn checker(&self) -> &UpdateChecker {
        &self.checker
    }

    pub fn auth(&self) -> &HubAuth {
        &self.auth
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Common skip/limit pagination query.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

pub(crate) type HandlerError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn map_error(err: HubError) -> HandlerError {
    let status = match &err {
        HubError::PluginNotFound { .. }
        | HubError::VersionNotFound { .. }
        | HubError::LicenseNotFound { .. } => StatusCode::NOT_FOUND,
        HubError::Conflict(_) => StatusCode::CONFLICT,
        HubError::Unauthenticated => StatusCode::UNAUTHORIZED,
        HubError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        HubError::InvalidInput(_) | HubError::ConfigError(_) => StatusCode::BAD_REQUEST,
        HubError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
        HubError::SerializationError(_) | HubError::IoError(_) | HubError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = ErrorResponse {
        error: err.to_string(),
        details: None,
    };
    (status, Json(body))
}

/// Admin endpoints: API key in the configured header.
pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), HandlerError> {
    let header_name = state.auth().header_name().to_string();
    let presented = headers
        .get(header_name.as_str())
        .and_then(|value| value.to_str().ok());

    if !state.auth().validate_admin(presented) {
        let body = ErrorResponse {
            error: "Unauthorized".to_string(),
            details: None,
        };
        return Err((StatusCode::UNAUTHORIZED, Json(body)));
    }
    Ok(())
}

/// Client endpoints with optional identity: an absent or unknown bearer
/// token yields an anonymous caller, not an error.
pub(crate) fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<UserIdentity> {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    state.auth().resolve_user(bearer)
}

/// Client endpoints that require a resolved user.
pub(crate) fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<UserIdentity, HandlerError> {
    optional_user(state, headers).ok_or_else(|| map_error(HubError::Unauthenticated))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // admin plugin CRUD
        .route(
            "/api/v1/plugins",
            post(catalog::handler::create_plugin).get(catalog::handler::list_plugins),
        )
        .route(
            "/api/v1/plugins/:plugin_id",
            get(catalog::handler::get_plugin)
                .put(catalog::handler::update_plugin)
                .delete(catalog::handler::delete_plugin),
        )
        .route(
            "/api/v1/plugins/:plugin_id/versions",
            post(catalog::handler::upload_version).get(catalog::handler::list_versions),
        )
        .route(
            "/api/v1/plugins/:plugin_id/versions/:version",
            delete(catalog::handler::delete_version),
        )
        // client-facing catalog
        .route("/api/v1/plugins/registry", get(catalog::handler::registry))
        .route("/api/v1/plugins/download", post(catalog::handler::download_descriptor))
        .route("/api/v1/plugins/purchase", post(license::handler::purchase))
        .route(
            "/api/v1/plugins/:plugin_id/versions/:version/download",
            get(catalog::handler::download_artifact),
        )
        // update-check protocol
        .route("/api/v1/plugins/check-update", post(update::handler::check_update))
        .route("/api/v1/plugins/check-updates", post(update::handler::check_updates))
        // usage events + stats
        .route("/api/v1/plugins/event", post(stats::handler::log_event))
        .route("/api/v1/stats/events", get(stats::handler::user_events))
        .route(
            "/api/v1/stats/plugins/:plugin_id/summary",
            get(stats::handler::summary),
        )
        .route("/api/v1/stats/plugins/:plugin_id", get(stats::handler::range))
        // licenses
        .route(
            "/api/v1/licenses",
            post(license::handler::issue_license),
        )
        .route(
            "/api/v1/licenses/user/:user_id",
            get(license::handler::list_user_licenses),
        )
        .route(
            "/api/v1/licenses/plugin/:plugin_id",
            get(license::handler::list_plugin_licenses),
        )
        .route(
            "/api/v1/licenses/:license_id",
            put(license::handler::update_license),
        )
        .route(
            "/api/v1/licenses/:license_id/revoke",
            post(license::handler::revoke_license),
        )
        .route("/api/v1/licenses/verify", post(license::handler::verify_license))
        .route("/api/v1/licenses/has-license", get(license::handler::has_license))
        .with_state(state)
}

pub async fn run_http_server(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting PipeHub HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
