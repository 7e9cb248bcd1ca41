//! LDAP provider: service-account bind, subtree search with the
//! `{{username}}` placeholder, then a rebind as the found DN.

use async_trait::async_trait;
use ldap3::{ldap_escape, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use shared_types::{AppError, TestProviderResponse};

use super::provider::{AuthErrorCode, AuthenticationResult, Credentials, LdapConfig, Provider};

const CONN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

pub struct LdapProvider {
    config: LdapConfig,
}

impl LdapProvider {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<ldap3::Ldap, String> {
        let settings = LdapConnSettings::new().set_conn_timeout(CONN_TIMEOUT);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(|e| format!("LDAP connection failed: {e}"))?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    async fn service_bind(&self) -> Result<ldap3::Ldap, String> {
        let mut ldap = self.connect().await?;
        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| format!("Service bind failed: {e}"))?
            .success()
            .map_err(|e| format!("Service bind rejected: {e}"))?;
        Ok(ldap)
    }
}

#[async_trait]
impl Provider for LdapProvider {
    async fn authenticate(&self, credentials: &Credentials) -> AuthenticationResult {
        if credentials.password.is_empty() {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidCredentials,
                "Password must not be empty",
            );
        }

        let mut ldap = match self.service_bind().await {
            Ok(ldap) => ldap,
            Err(message) => {
                tracing::warn!(error = message, "LDAP service bind failed");
                return AuthenticationResult::failure(AuthErrorCode::ProviderUnavailable, message);
            }
        };

        let filter = self
            .config
            .search_filter
            .replace("{{username}}", &ldap_escape(&credentials.username));
        let attrs = vec![
            self.config.email_attribute().to_string(),
            self.config.name_attribute().to_string(),
        ];

        let entries = match ldap
            .search(&self.config.search_base, Scope::Subtree, &filter, attrs)
            .await
            .and_then(|result| result.success())
        {
            Ok((entries, _)) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "LDAP search failed");
                return AuthenticationResult::failure(
                    AuthErrorCode::ProviderUnavailable,
                    format!("LDAP search failed: {e}"),
                );
            }
        };
        let _ = ldap.unbind().await;

        let Some(entry) = entries.into_iter().next().map(SearchEntry::construct) else {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidCredentials,
                "Invalid username or password",
            );
        };

        // Rebind as the found DN with the user's password.
        let mut user_ldap = match self.connect().await {
            Ok(ldap) => ldap,
            Err(message) => {
                return AuthenticationResult::failure(AuthErrorCode::ProviderUnavailable, message)
            }
        };
        let bound = user_ldap
            .simple_bind(&entry.dn, &credentials.password)
            .await
            .map(|result| result.success().is_ok())
            .unwrap_or(false);
        let _ = user_ldap.unbind().await;

        if !bound {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidCredentials,
                "Invalid username or password",
            );
        }

        let Some(email) = entry
            .attrs
            .get(self.config.email_attribute())
            .and_then(|values| values.first())
            .cloned()
        else {
            return AuthenticationResult::failure(
                AuthErrorCode::MissingEmail,
                "Directory entry has no email attribute",
            );
        };
        let name = entry
            .attrs
            .get(self.config.name_attribute())
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_else(|| credentials.username.clone());

        AuthenticationResult::ok(entry.dn.clone(), Some(email), Some(name))
    }

    fn validate_config(&self) -> Result<(), AppError> {
        self.config.validate()
    }

    async fn test_connection(&self) -> TestProviderResponse {
        match self.service_bind().await {
            Ok(mut ldap) => {
                let _ = ldap.unbind().await;
                TestProviderResponse {
                    success: true,
                    message: "Service bind succeeded".to_string(),
                }
            }
            Err(message) => TestProviderResponse {
                success: false,
                message,
            },
        }
    }
}
