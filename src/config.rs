use crate::error::{HubError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub log_level: String,
    /// Absolute base used when constructing download URLs in update-check
    /// responses, e.g. "https://hub.example.com".
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: String,
    pub artifact_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    // Comma-separated admin API keys via env; replace with hashed store in production
    pub admin_keys: Vec<String>,
    pub header_name: String,
    /// Static bearer-token to user-id pairs ("token:user"). The real auth
    /// service is an external collaborator; this is its narrow stand-in.
    pub user_tokens: Vec<(String, String)>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8080,
                log_level: "info".to_string(),
                base_url: "http://localhost:8080".to_string(),
            },
            storage: StorageConfig {
                db_path: "pipehub_db".to_string(),
                artifact_dir: "pipehub_artifacts".to_string(),
            },
            auth: AuthConfig {
                enabled: false,
                admin_keys: vec![],
                header_name: "x-api-key".to_string(),
                user_tokens: vec![],
            },
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(port) = std::env::var("PIPEHUB_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| HubError::config_error("Invalid PIPEHUB_PORT"))?;
        }

        if let Ok(log_level) = std::env::var("PIPEHUB_LOG_LEVEL") {
            config.server.log_level = log_level;
        }

        if let Ok(base_url) = std::env::var("PIPEHUB_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.server.base_url = base_url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(db_path) = std::env::var("PIPEHUB_DB_PATH") {
            config.storage.db_path = db_path;
        }

        if let Ok(artifact_dir) = std::env::var("PIPEHUB_ARTIFACT_DIR") {
            config.storage.artifact_dir = artifact_dir;
        }

        // Auth configuration
        if let Ok(enabled) = std::env::var("PIPEHUB_AUTH_ENABLED") {
            config.auth.enabled = matches!(enabled.as_str(), "1" | "true" | "TRUE" | "yes" | "on");
        }
        if let Ok(keys) = std::env::var("PIPEHUB_ADMIN_KEYS") {
            let list = keys
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            if !list.is_empty() {
                config.auth.admin_keys = list;
            }
        }
        if let Ok(header_name) = std::env::var("PIPEHUB_AUTH_HEADER") {
            if !header_name.trim().is_empty() {
                config.auth.header_name = header_name;
            }
        }
        if let Ok(tokens) = std::env::var("PIPEHUB_USER_TOKENS") {
            config.auth.user_tokens = parse_user_tokens(&tokens)?;
        }

        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HubError::config_error(format!("Failed to read config file: {}", e)))?;

        let config: HubConfig = toml::from_str(&content)
            .map_err(|e| HubError::config_error(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }
}

fn parse_user_tokens(raw: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((token, user)) if !token.is_empty() && !user.is_empty() => {
                pairs.push((token.to_string(), user.to_string()));
            }
            _ => {
                return Err(HubError::config_error(format!(
                    "Invalid PIPEHUB_USER_TOKENS entry: {}",
                    entry
                )));
            }
        }
    }
    Ok(pairs)
}
