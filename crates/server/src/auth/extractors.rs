use axum::{extract::FromRequestParts, http::request::Parts};
use shared_types::{AppError, User};

/// Authenticated user resolved by the middleware, carried in request
/// extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Extractor that requires authentication. Returns 401 if the middleware
/// attached no user.
pub struct AuthRequired(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(|current| AuthRequired(current.0))
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Extractor that requires an admin. 401 if unauthenticated, 403 if the
/// user is not an admin.
pub struct AdminRequired(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AdminRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(|current| current.0)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        if !user.is_admin {
            return Err(AppError::forbidden("Admin role required"));
        }
        Ok(AdminRequired(user))
    }
}
