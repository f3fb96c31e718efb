//! Role gates layered over [`AuthUser`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use windowgate_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Profile management: only admins author and map profiles.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::info!(user_id = user.user_id, role = %user.role, path = %parts.uri.path(), "Profile management denied");
            return Err(AppError::Core(CoreError::Forbidden("Admin role required".into())));
        }
        Ok(RequireAdmin(user))
    }
}

/// State queries: any verified caller.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        AuthUser::from_request_parts(parts, state).await.map(RequireAuth)
    }
}
