use async_trait::async_trait;
use shared_types::TestProviderResponse;
use sqlx::{Pool, Postgres};

use super::password::verify_password;
use super::provider::{AuthErrorCode, AuthenticationResult, Credentials, Provider};
use crate::repo;

/// Email/password authentication against `users.password_hash`.
pub struct LocalProvider {
    pool: Pool<Postgres>,
}

impl LocalProvider {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn authenticate(&self, credentials: &Credentials) -> AuthenticationResult {
        let user = match repo::users::find_by_email(&self.pool, &credentials.username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return AuthenticationResult::failure(
                    AuthErrorCode::InvalidCredentials,
                    "Invalid email or password",
                )
            }
            Err(e) => {
                tracing::error!(error = %e, "Local authentication lookup failed");
                return AuthenticationResult::failure(
                    AuthErrorCode::ProviderUnavailable,
                    "Authentication is temporarily unavailable",
                );
            }
        };

        if user.disabled {
            return AuthenticationResult::failure(
                AuthErrorCode::UserDisabled,
                "This account has been disabled",
            );
        }

        let Some(hash) = &user.password_hash else {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidCredentials,
                "This account uses single sign-on. Sign in through your identity provider.",
            );
        };

        if !verify_password(&credentials.password, hash) {
            return AuthenticationResult::failure(
                AuthErrorCode::InvalidCredentials,
                "Invalid email or password",
            );
        }

        AuthenticationResult::ok(
            user.id.to_string(),
            Some(user.email.clone()),
            Some(user.display_name.clone()),
        )
    }

    async fn test_connection(&self) -> TestProviderResponse {
        match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => TestProviderResponse {
                success: true,
                message: "Local provider ready".to_string(),
            },
            Err(e) => TestProviderResponse {
                success: false,
                message: format!("Database unreachable: {e}"),
            },
        }
    }
}
