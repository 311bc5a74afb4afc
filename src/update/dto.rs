use serde::{Deserialize, Serialize};

/// Single update check. `pipe_id` is the historical client-side name for the
/// plugin identifier, kept for wire compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckUpdateRequest {
    pub pipe_id: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCheckRequest {
    pub plugins: Vec<BatchCheckItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchCheckItem {
    #[serde(default)]
    pub pipe_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub has_update: bool,
    pub current_version: String,
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
}

impl UpdateInfo {
    /// No catalog version to offer: report the client's own version back.
    pub fn no_update(current_version: &str) -> Self {
        Self {
            has_update: false,
            current_version: current_version.to_string(),
            latest_version: current_version.to_string(),
            latest_file_hash: None,
            latest_file_size: None,
            download_url: None,
            changelog: None,
        }
    }
}

/// One entry per requested plugin, in request order. Failures are data, not
/// exceptions: an errored item carries `error` + `status` and never aborts
/// the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResultItem {
    pub pipe_id: String,
    #[serde(default, flatten, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCheckResponse {
    pub results: Vec<BatchResultItem>,
}
