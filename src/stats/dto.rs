use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginEventType {
    Install,
    Uninstall,
    Update,
    Activate,
    Deactivate,
}

/// Append-only usage event. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginUsageLog {
    pub id: u64,
    pub plugin_id: u64,
    pub user_id: String,
    #[serde(default)]
    pub machine_id: Option<String>,
    pub event_type: PluginEventType,
    #[serde(default)]
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogCreate {
    pub plugin_id: u64,
    pub event_type: PluginEventType,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
}

/// One row per (plugin, day), counters only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStats {
    pub plugin_id: u64,
    pub date: NaiveDate,
    pub active_installs: u64,
    pub new_installs: u64,
    pub uninstalls: u64,
    pub updates: u64,
    pub downloads: u64,
}

impl PluginStats {
    pub fn empty(plugin_id: u64, date: NaiveDate) -> Self {
        Self {
            plugin_id,
            date,
            active_installs: 0,
            new_installs: 0,
            uninstalls: 0,
            updates: 0,
            downloads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub installs: u64,
    pub uninstalls: u64,
    pub updates: u64,
    pub downloads: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    /// All-time, not window-bounded.
    pub total_installs: u64,
    pub active_installs: u64,
    pub total_downloads: u64,
    /// Installs within the requested window divided by its length in days.
    pub average_daily_installs: f64,
    pub install_trend: Vec<TrendPoint>,
}
