//! OIDC provider: Authorization Code with mandatory PKCE. Issuer metadata
//! is discovered and cached per issuer URL; authorization state is
//! persisted in the store and mirrored in the KV cache, and is single use.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{CsrfToken, PkceCodeChallenge};
use serde::Deserialize;
use shared_types::{AppError, AuthProvider, AuthorizeResponse, OidcState, TestProviderResponse};
use sqlx::{Pool, Postgres};

use super::provider::{AuthErrorCode, AuthenticationResult, Credentials, OidcConfig, Provider};
use crate::cache::{keys, Cache};
use crate::repo;

/// Issuer discovery documents, cached process-locally for an hour.
static DISCOVERY_CACHE: LazyLock<tokio::sync::RwLock<HashMap<String, (DiscoveryDocument, Instant)>>> =
    LazyLock::new(|| tokio::sync::RwLock::new(HashMap::new()));

const DISCOVERY_TTL: Duration = Duration::from_secs(3600);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    access_token: Option<String>,
}

pub struct OidcProvider {
    record: AuthProvider,
    config: OidcConfig,
    pool: Pool<Postgres>,
    cache: Cache,
    http: reqwest::Client,
}

impl OidcProvider {
    pub fn new(
        record: AuthProvider,
        config: OidcConfig,
        pool: Pool<Postgres>,
        cache: Cache,
        http: reqwest::Client,
    ) -> Self {
        Self {
            record,
            config,
            pool,
            cache,
            http,
        }
    }

    async fn discover(&self) -> Result<DiscoveryDocument, AppError> {
        let issuer = self.config.issuer_url.trim_end_matches('/').to_string();

        if let Some((document, fetched_at)) = DISCOVERY_CACHE.read().await.get(&issuer) {
            if fetched_at.elapsed() < DISCOVERY_TTL {
                return Ok(document.clone());
            }
        }

        let url = format!("{issuer}/.well-known/openid-configuration");
        let document: DiscoveryDocument = self
            .http
            .get(&url)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::internal(format!("Issuer discovery failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::internal(format!("Issuer discovery failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::internal(format!("Invalid discovery document: {e}")))?;

        DISCOVERY_CACHE
            .write()
            .await
            .insert(issuer, (document.clone(), Instant::now()));
        Ok(document)
    }

    /// Load the pending state: KV cache first, then the store. Enforces
    /// the TTL regardless of which copy answered.
    async fn load_state(&self, state: &str) -> Option<OidcState> {
        let cached = self
            .cache
            .get_json::<OidcState>(&keys::oidc_state(state))
            .await;
        let stored = match cached {
            Some(stored) => Some(stored),
            None => repo::oidc_states::find_valid(&self.pool, state)
                .await
                .ok()
                .flatten(),
        };

        stored.filter(|s| {
            (Utc::now() - s.created_at).num_seconds() <= repo::oidc_states::STATE_TTL_SECS
        })
    }

    /// Single-use guarantee: remove the state from both the store and the
    /// cache before any session is produced.
    async fn consume_state(&self, state: &str) {
        if let Err(e) = repo::oidc_states::delete(&self.pool, state).await {
            tracing::error!(error = %e, "Failed to delete OIDC state from store");
        }
        self.cache.delete(&keys::oidc_state(state)).await;
    }

    fn extract_claims(id_token: &str) -> Result<serde_json::Value, String> {
        use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

        // The token arrives directly from the token endpoint over the
        // exchange we initiated; nonce and email_verified are checked
        // explicitly by the caller.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<serde_json::Value>(id_token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| format!("Failed to decode ID token: {e}"))
    }
}

#[async_trait]
impl Provider for OidcProvider {
    async fn authenticate(&self, _credentials: &Credentials) -> AuthenticationResult {
        AuthenticationResult::failure(
            AuthErrorCode::ProviderError,
            "OIDC providers authenticate through the redirect flow",
        )
    }

    fn supports_redirect(&self) -> bool {
        true
    }

    async fn get_authorization_url(&self, redirect_uri: &str) -> Result<AuthorizeResponse, AppError> {
        let discovery = self.discover().await?;

        let state = CsrfToken::new_random().secret().clone();
        let nonce = CsrfToken::new_random().secret().clone();
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        // Persist before redirecting; the callback must be able to find it.
        let row = repo::oidc_states::create(
            &self.pool,
            &state,
            &nonce,
            self.record.id,
            redirect_uri,
            verifier.secret(),
        )
        .await?;
        self.cache
            .set_json(
                &keys::oidc_state(&state),
                &row,
                repo::oidc_states::STATE_TTL_SECS as u64,
            )
            .await;
        if let Err(e) = repo::oidc_states::prune_expired(&self.pool).await {
            tracing::warn!(error = %e, "Failed to prune expired OIDC states");
        }

        let scope = self.config.scopes().join(" ");
        let url = reqwest::Url::parse_with_params(
            &discovery.authorization_endpoint,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("nonce", nonce.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| AppError::internal(format!("Invalid authorization endpoint: {e}")))?;

        Ok(AuthorizeResponse {
            url: url.to_string(),
            state,
            provider: self.record.slug.clone(),
        })
    }

    async fn handle_callback(&self, code: &str, state: &str) -> AuthenticationResult {
        let Some(stored) = self.load_state(state).await else {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidState,
                "Invalid or expired authentication state",
            );
        };

        let discovery = match self.discover().await {
            Ok(discovery) => discovery,
            Err(e) => {
                return AuthenticationResult::failure(
                    AuthErrorCode::ProviderUnavailable,
                    e.message,
                )
            }
        };

        let response = match self
            .http
            .post(&discovery.token_endpoint)
            .timeout(HTTP_TIMEOUT)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", stored.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code_verifier", stored.code_verifier.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return AuthenticationResult::failure(
                    AuthErrorCode::ProviderUnavailable,
                    format!("Token exchange failed: {e}"),
                )
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = body, "OIDC token exchange rejected");
            return AuthenticationResult::failure(
                AuthErrorCode::ProviderError,
                format!("Token exchange rejected ({status})"),
            );
        }

        let token: TokenResponse = match response.json().await {
            Ok(token) => token,
            Err(e) => {
                return AuthenticationResult::failure(
                    AuthErrorCode::ProviderError,
                    format!("Invalid token response: {e}"),
                )
            }
        };

        let Some(id_token) = token.id_token else {
            return AuthenticationResult::failure(
                AuthErrorCode::ProviderError,
                "Token response did not include an ID token",
            );
        };

        let claims = match Self::extract_claims(&id_token) {
            Ok(claims) => claims,
            Err(message) => {
                return AuthenticationResult::failure(AuthErrorCode::ProviderError, message)
            }
        };

        if claims.get("nonce").and_then(|v| v.as_str()) != Some(stored.nonce.as_str()) {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidState,
                "Nonce mismatch in ID token",
            );
        }

        let Some(sub) = claims.get("sub").and_then(|v| v.as_str()) else {
            return AuthenticationResult::failure(
                AuthErrorCode::ProviderError,
                "ID token did not include a subject",
            );
        };

        let email = claims
            .get(self.config.email_claim())
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let Some(email) = email else {
            return AuthenticationResult::failure(
                AuthErrorCode::MissingEmail,
                "Identity provider did not supply an email address",
            );
        };

        if claims.get("email_verified").and_then(|v| v.as_bool()) == Some(false) {
            return AuthenticationResult::failure(
                AuthErrorCode::EmailNotVerified,
                "Email address is not verified with the identity provider",
            );
        }

        let name = claims
            .get(self.config.name_claim())
            .and_then(|v| v.as_str())
            .or_else(|| claims.get("preferred_username").and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());

        // One-shot: the state dies before the result is returned.
        self.consume_state(state).await;

        AuthenticationResult::ok(sub.to_string(), Some(email), Some(name))
            .with_metadata(serde_json::json!({ "issuer": discovery.issuer }))
    }

    fn validate_config(&self) -> Result<(), AppError> {
        self.config.validate()
    }

    async fn test_connection(&self) -> TestProviderResponse {
        match self.discover().await {
            Ok(document) => TestProviderResponse {
                success: true,
                message: format!("Discovered issuer {}", document.issuer),
            },
            Err(e) => TestProviderResponse {
                success: false,
                message: e.message,
            },
        }
    }
}
