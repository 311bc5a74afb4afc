use std::sync::Arc;

use crate::catalog::{PluginCatalog, PluginVisibility};
use crate::error::{HubError, Result};
use crate::license::LicenseStore;
use crate::version::is_newer;

use super::dto::{BatchCheckItem, BatchResultItem, UpdateInfo};

pub struct UpdateChecker {
    catalog: Arc<PluginCatalog>,
    licenses: Arc<LicenseStore>,
    base_url: String,
}

impl UpdateChecker {
    pub fn new(catalog: Arc<PluginCatalog>, licenses: Arc<LicenseStore>, base_url: &str) -> Self {
        Self {
            catalog,
            licenses,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn download_url(&self, plugin_id: u64, version: &str) -> String {
        format!(
            "{}/api/v1/plugins/{}/versions/{}/download",
            self.base_url, plugin_id, version
        )
    }

    /// Single update check. Private plugins require an authenticated caller
    /// holding a usable license: anonymous -> Unauthenticated, known user
    /// without a license -> PermissionDenied.
    pub fn check_one(
        &self,
        plugin_id: u64,
        current_version: &str,
        user_id: Option<&str>,
    ) -> Result<UpdateInfo> {
        let plugin = self.catalog.get(plugin_id)?;

        if plugin.visibility == PluginVisibility::Private {
            match user_id {
                None => return Err(HubError::Unauthenticated),
                Some(user) => {
                    if !self.licenses.has_valid_license(user, plugin_id)? {
                        return Err(HubError::permission_denied(
                            "You don't have permission to access this plugin",
                        ));
                    }
                }
            }
        }

        let Some(latest) = self.catalog.latest_version(plugin_id)? else {
            return Ok(UpdateInfo::no_update(current_version));
        };

        let has_update = is_newer(current_version, &latest.version);
        if !has_update {
            return Ok(UpdateInfo {
                has_update: false,
                current_version: current_version.to_string(),
                latest_version: latest.version,
                latest_file_hash: None,
                latest_file_size: None,
                download_url: None,
                changelog: None,
            });
        }

        Ok(UpdateInfo {
            has_update: true,
            current_version: current_version.to_string(),
            download_url: Some(self.download_url(plugin_id, &latest.version)),
            latest_file_hash: Some(latest.zip_hash),
            latest_file_size: Some(latest.zip_size),
            changelog: latest.changelog,
            latest_version: latest.version,
        })
    }

    /// Batch check: same-length result list, each element computed
    /// independently. One broken item never prevents results for the others.
    pub fn check_batch(
        &self,
        items: &[BatchCheckItem],
        user_id: Option<&str>,
    ) -> Vec<BatchResultItem> {
        items
            .iter()
            .map(|item| self.check_batch_item(item, user_id))
            .collect()
    }

    fn check_batch_item(&self, item: &BatchCheckItem, user_id: Option<&str>) -> BatchResultItem {
        let (Some(pipe_id), Some(version)) = (item.pipe_id.as_deref(), item.version.as_deref())
        else {
            return BatchResultItem {
                pipe_id: item.pipe_id.clone().unwrap_or_else(|| "unknown".to_string()),
                update: None,
                error: Some("Missing pipe_id or version".to_string()),
                status: Some(400),
            };
        };

        let plugin_id = match pipe_id.parse::<u64>() {
            Ok(id) => id,
            Err(_) => {
                return BatchResultItem {
                    pipe_id: pipe_id.to_string(),
                    update: None,
                    error: Some("Invalid plugin id".to_string()),
                    status: Some(400),
                };
            }
        };

        match self.check_one(plugin_id, version, user_id) {
            Ok(update) => BatchResultItem {
                pipe_id: pipe_id.to_string(),
                update: Some(update),
                error: None,
                status: None,
            },
            Err(err) => {
                let (status, message) = batch_error(&err);
                BatchResultItem {
                    pipe_id: pipe_id.to_string(),
                    update: None,
                    error: Some(message),
                    status: Some(status),
                }
            }
        }
    }
}

fn batch_error(err: &HubError) -> (u16, String) {
    match err {
        HubError::PluginNotFound { .. } => (404, "Plugin not found".to_string()),
        HubError::Unauthenticated => (401, "Authentication required".to_string()),
        HubError::PermissionDenied(_) => (403, "Permission denied".to_string()),
        HubError::InvalidInput(msg) => (400, msg.clone()),
        other => (500, other.to_string()),
    }
}
