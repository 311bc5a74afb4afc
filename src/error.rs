use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Plugin not found: {id}")]
    PluginNotFound { id: u64 },

    #[error("Plugin version not found: {version}")]
    VersionNotFound { version: String },

    #[error("License not found: {id}")]
    LicenseNotFound { id: u64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    pub fn plugin_not_found(id: u64) -> Self {
        HubError::PluginNotFound { id }
    }

    pub fn version_not_found(version: impl Into<String>) -> Self {
        HubError::VersionNotFound {
            version: version.into(),
        }
    }

    pub fn license_not_found(id: u64) -> Self {
        HubError::LicenseNotFound { id }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        HubError::Conflict(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        HubError::PermissionDenied(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        HubError::InvalidInput(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        HubError::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        HubError::Internal(msg.into())
    }
}
