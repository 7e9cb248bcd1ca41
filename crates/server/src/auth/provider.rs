//! The pluggable provider abstraction: one trait, three implementations
//! (local, OIDC, LDAP), and the typed per-kind configuration that
//! replaces an open-ended config map.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{AppError, AuthorizeResponse, TestProviderResponse};

/// Placeholder shown instead of sensitive config values in admin reads.
pub const SECRET_MASK: &str = "••••••••";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorCode {
    InvalidCredentials,
    UserDisabled,
    ProviderUnavailable,
    ProviderError,
    InvalidState,
    MissingEmail,
    EmailNotVerified,
    AutoRegisterDisabled,
    AccountLocked,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthErrorCode::UserDisabled => "USER_DISABLED",
            AuthErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            AuthErrorCode::ProviderError => "PROVIDER_ERROR",
            AuthErrorCode::InvalidState => "INVALID_STATE",
            AuthErrorCode::MissingEmail => "MISSING_EMAIL",
            AuthErrorCode::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AuthErrorCode::AutoRegisterDisabled => "AUTO_REGISTER_DISABLED",
            AuthErrorCode::AccountLocked => "ACCOUNT_LOCKED",
        }
    }
}

/// Outcome of a provider authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub success: bool,
    pub provider_user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub metadata: serde_json::Value,
    pub error: Option<String>,
    pub error_code: Option<AuthErrorCode>,
}

impl AuthenticationResult {
    pub fn ok(provider_user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            success: true,
            provider_user_id: Some(provider_user_id),
            email,
            name,
            metadata: serde_json::json!({}),
            error: None,
            error_code: None,
        }
    }

    pub fn failure(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_user_id: None,
            email: None,
            name: None,
            metadata: serde_json::json!({}),
            error: Some(message.into()),
            error_code: Some(code),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Username/password credentials for the non-redirect providers.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A configured authentication provider.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> AuthenticationResult;

    fn supports_redirect(&self) -> bool {
        false
    }

    async fn get_authorization_url(&self, _redirect_uri: &str) -> Result<AuthorizeResponse, AppError> {
        Err(AppError::bad_request("Provider does not support redirect"))
    }

    async fn handle_callback(&self, _code: &str, _state: &str) -> AuthenticationResult {
        AuthenticationResult::failure(
            AuthErrorCode::ProviderError,
            "Provider does not support callbacks",
        )
    }

    fn validate_config(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn test_connection(&self) -> TestProviderResponse;
}

// ---------------------------------------------------------------------------
// Typed provider configuration
// ---------------------------------------------------------------------------

/// OIDC provider configuration. Unknown keys are rejected on parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OidcConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub email_claim: Option<String>,
    #[serde(default)]
    pub name_claim: Option<String>,
}

impl OidcConfig {
    /// Plain HTTP is a development affordance for localhost issuers only.
    pub fn issuer_allowed(url: &str) -> bool {
        if url.starts_with("https://") {
            return true;
        }
        if let Some(rest) = url.strip_prefix("http://") {
            let host = rest.split(['/', ':']).next().unwrap_or("");
            return host == "localhost" || host == "127.0.0.1";
        }
        false
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !Self::issuer_allowed(&self.issuer_url) {
            return Err(AppError::bad_request(
                "issuerUrl must use https (http is allowed for localhost only)",
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(AppError::bad_request("clientId must not be empty"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AppError::bad_request("clientSecret must not be empty"));
        }
        Ok(())
    }

    pub fn scopes(&self) -> Vec<String> {
        match &self.scopes {
            Some(scopes) if !scopes.is_empty() => scopes.clone(),
            _ => vec!["openid".into(), "email".into(), "profile".into()],
        }
    }

    pub fn email_claim(&self) -> &str {
        self.email_claim.as_deref().unwrap_or("email")
    }

    pub fn name_claim(&self) -> &str {
        self.name_claim.as_deref().unwrap_or("name")
    }
}

/// LDAP provider configuration. The search filter must carry the
/// `{{username}}` placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LdapConfig {
    pub url: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub search_base: String,
    pub search_filter: String,
    #[serde(default)]
    pub email_attribute: Option<String>,
    #[serde(default)]
    pub name_attribute: Option<String>,
}

impl LdapConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.url.starts_with("ldap://") && !self.url.starts_with("ldaps://") {
            return Err(AppError::bad_request(
                "url must begin with ldap:// or ldaps://",
            ));
        }
        if self.search_base.trim().is_empty() {
            return Err(AppError::bad_request("searchBase must not be empty"));
        }
        if !self.search_filter.contains("{{username}}") {
            return Err(AppError::bad_request(
                "searchFilter must contain the {{username}} placeholder",
            ));
        }
        Ok(())
    }

    pub fn email_attribute(&self) -> &str {
        self.email_attribute.as_deref().unwrap_or("mail")
    }

    pub fn name_attribute(&self) -> &str {
        self.name_attribute.as_deref().unwrap_or("cn")
    }
}

/// Mask sensitive fields for admin responses.
pub fn mask_config(config: &serde_json::Value) -> serde_json::Value {
    let mut masked = config.clone();
    if let Some(obj) = masked.as_object_mut() {
        for key in ["clientSecret", "bindPassword"] {
            if obj.contains_key(key) {
                obj.insert(key.to_string(), serde_json::json!(SECRET_MASK));
            }
        }
    }
    masked
}

/// Merge an admin config update over the stored config: masked sentinel
/// values keep the stored secret.
pub fn merge_config_update(
    stored: &serde_json::Value,
    update: serde_json::Value,
) -> serde_json::Value {
    let mut merged = update;
    if let (Some(obj), Some(stored_obj)) = (merged.as_object_mut(), stored.as_object()) {
        for key in ["clientSecret", "bindPassword"] {
            if obj.get(key).and_then(|v| v.as_str()) == Some(SECRET_MASK) {
                match stored_obj.get(key) {
                    Some(original) => {
                        obj.insert(key.to_string(), original.clone());
                    }
                    None => {
                        obj.remove(key);
                    }
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oidc_config_rejects_unknown_keys() {
        let raw = json!({
            "issuerUrl": "https://id.example.com",
            "clientId": "abc",
            "clientSecret": "xyz",
            "surprise": true
        });
        assert!(serde_json::from_value::<OidcConfig>(raw).is_err());
    }

    #[test]
    fn oidc_issuer_allowance() {
        assert!(OidcConfig::issuer_allowed("https://id.example.com"));
        assert!(OidcConfig::issuer_allowed("http://localhost:8080/realms/dev"));
        assert!(OidcConfig::issuer_allowed("http://127.0.0.1/auth"));
        assert!(!OidcConfig::issuer_allowed("http://id.example.com"));
        assert!(!OidcConfig::issuer_allowed("ftp://id.example.com"));
    }

    #[test]
    fn oidc_default_scopes_and_claims() {
        let config: OidcConfig = serde_json::from_value(json!({
            "issuerUrl": "https://id.example.com",
            "clientId": "abc",
            "clientSecret": "xyz"
        }))
        .unwrap();
        assert_eq!(config.scopes(), vec!["openid", "email", "profile"]);
        assert_eq!(config.email_claim(), "email");
        assert_eq!(config.name_claim(), "name");
    }

    #[test]
    fn ldap_config_requires_placeholder_and_scheme() {
        let config: LdapConfig = serde_json::from_value(json!({
            "url": "ldaps://ldap.example.com",
            "bindDn": "cn=svc,dc=example,dc=com",
            "bindPassword": "secret",
            "searchBase": "ou=people,dc=example,dc=com",
            "searchFilter": "(uid={{username}})"
        }))
        .unwrap();
        assert!(config.validate().is_ok());

        let bad_scheme = LdapConfig {
            url: "http://ldap.example.com".into(),
            ..config.clone()
        };
        assert!(bad_scheme.validate().is_err());

        let bad_filter = LdapConfig {
            search_filter: "(uid=admin)".into(),
            ..config
        };
        assert!(bad_filter.validate().is_err());
    }

    #[test]
    fn mask_and_merge_round_trip() {
        let stored = json!({"clientId": "abc", "clientSecret": "real-secret", "issuerUrl": "https://x"});
        let masked = mask_config(&stored);
        assert_eq!(masked["clientSecret"], SECRET_MASK);
        assert_eq!(masked["clientId"], "abc");

        // Sending the masked value back preserves the stored secret.
        let merged = merge_config_update(&stored, masked);
        assert_eq!(merged["clientSecret"], "real-secret");

        // Sending a new value replaces it.
        let update = json!({"clientId": "abc", "clientSecret": "new-secret", "issuerUrl": "https://x"});
        let merged = merge_config_update(&stored, update);
        assert_eq!(merged["clientSecret"], "new-secret");
    }

    #[test]
    fn error_codes_render_screaming_snake() {
        assert_eq!(AuthErrorCode::InvalidState.as_str(), "INVALID_STATE");
        assert_eq!(
            AuthErrorCode::AutoRegisterDisabled.as_str(),
            "AUTO_REGISTER_DISABLED"
        );
    }
}
