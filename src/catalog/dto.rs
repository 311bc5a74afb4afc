use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Active,
    Disabled,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginVisibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub status: PluginStatus,
    pub visibility: PluginVisibility,
    pub downloads_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> PluginStatus {
    PluginStatus::Active
}

fn default_visibility() -> PluginVisibility {
    PluginVisibility::Private
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_status")]
    pub status: PluginStatus,
    #[serde(default = "default_visibility")]
    pub visibility: PluginVisibility,
}

/// Partial update: unset fields leave the record unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<PluginStatus>,
    #[serde(default)]
    pub visibility: Option<PluginVisibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginVersion {
    pub id: u64,
    pub plugin_id: u64,
    pub version: String,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub min_app_version: Option<String>,
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, String>>,
    pub zip_url: String,
    pub zip_hash: String,
    pub zip_size: u64,
    /// Artifact file name as written at upload time. Kept on the row so a
    /// later plugin rename cannot orphan the stored file.
    #[serde(default)]
    pub file_name: String,
    pub is_latest: bool,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginVersionCreate {
    pub version: String,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub min_app_version: Option<String>,
    #[serde(default)]
    pub dependencies: Option<BTreeMap<String, String>>,
}

/// Version upload payload: metadata plus the base64-encoded package bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionUpload {
    #[serde(flatten)]
    pub data: PluginVersionCreate,
    pub file_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadPluginRequest {
    pub pipe_id: String,
}

/// Download descriptor handed to clients before they fetch the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub download_url: String,
    pub file_hash: String,
    pub file_size: u64,
}

/// Client-facing registry projection: public plugins plus the caller's
/// licensed private plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Private plugin the caller has not purchased yet.
    pub is_paid: bool,
    pub status: PluginStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub latest_version: Option<String>,
    pub downloads_count: u64,
}
