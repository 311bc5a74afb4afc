use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginLicense {
    pub id: u64,
    pub user_id: String,
    pub plugin_id: u64,
    pub license_key: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub status: LicenseStatus,
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub last_verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseCreate {
    pub user_id: String,
    pub plugin_id: u64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub machine_id: Option<String>,
}

/// Admin-side partial update. Double-Option fields distinguish "leave as is"
/// from "set to null".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseUpdate {
    #[serde(default)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub status: Option<LicenseStatus>,
    #[serde(default)]
    pub machine_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub license_key: String,
    pub plugin_id: u64,
    #[serde(default)]
    pub machine_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub pipe_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HasLicenseParams {
    pub plugin_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HasLicenseResponse {
    pub has_license: bool,
}

/// Verification is a query: failures carry a reason instead of an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl VerifyOutcome {
    pub fn valid(expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            valid: true,
            reason: None,
            expires_at,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            expires_at: None,
        }
    }
}
