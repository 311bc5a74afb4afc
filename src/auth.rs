use std::collections::HashMap;

use crate::config::AuthConfig;

/// Authenticated caller identity as resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
}

/// Admin API-key check plus a static bearer-token resolver.
///
/// The production auth service (email/OAuth login, token issuance) is an
/// external collaborator; this type covers its narrow consumed interface:
/// "given a credential, who is this?".
#[derive(Clone, Debug)]
pub struct HubAuth {
    enabled: bool,
    header_name: String,
    // For now keep raw secrets; replace with hashed+DB in production
    admin_keys: Vec<String>,
    user_tokens: HashMap<String, String>,
}

impl HubAuth {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            header_name: cfg.header_name.clone(),
            admin_keys: cfg.admin_keys.clone(),
            user_tokens: cfg.user_tokens.iter().cloned().collect(),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Validates an admin API key. Always passes when auth is disabled.
    pub fn validate_admin(&self, presented: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        let key = match presented {
            Some(k) if !k.is_empty() => k,
            _ => return false,
        };
        self.admin_keys
            .iter()
            .any(|allowed| constant_time_eq(allowed.as_bytes(), key.as_bytes()))
    }

    /// Resolves a bearer token to a user identity, or None when the token is
    /// absent or unknown.
    pub fn resolve_user(&self, bearer: Option<&str>) -> Option<UserIdentity> {
        let token = bearer?.trim();
        if token.is_empty() {
            return None;
        }
        self.user_tokens
            .iter()
            .find(|(known, _)| constant_time_eq(known.as_bytes(), token.as_bytes()))
            .map(|(_, user_id)| UserIdentity {
                user_id: user_id.clone(),
            })
    }
}

// Minimal constant-time equality to avoid timing leaks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut r: u8 = 0;
    for i in 0..a.len() {
        r |= a[i] ^ b[i];
    }
    r == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            admin_keys: vec!["admin-secret".into()],
            header_name: "x-api-key".into(),
            user_tokens: vec![("tok-alice".into(), "alice".into())],
        }
    }

    #[test]
    fn admin_key_checked_when_enabled() {
        let auth = HubAuth::new(&test_config());
        assert!(auth.validate_admin(Some("admin-secret")));
        assert!(!auth.validate_admin(Some("wrong")));
        assert!(!auth.validate_admin(None));
    }

    #[test]
    fn disabled_auth_allows_any_admin_key() {
        let mut cfg = test_config();
        cfg.enabled = false;
        let auth = HubAuth::new(&cfg);
        assert!(auth.validate_admin(None));
        assert!(auth.validate_admin(Some("whatever")));
    }

    #[test]
    fn bearer_token_resolves_user() {
        let auth = HubAuth::new(&test_config());
        let user = auth.resolve_user(Some("tok-alice")).unwrap();
        assert_eq!(user.user_id, "alice");
        assert!(auth.resolve_user(Some("tok-unknown")).is_none());
        assert!(auth.resolve_user(None).is_none());
    }
}
