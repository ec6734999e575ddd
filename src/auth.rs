// src/auth.rs
//! Request-scoped identity.
//!
//! Accounts, login and token issuance belong to the auth service. Here we only
//! resolve `Authorization: Bearer <token>` to a [`User`]; a missing, malformed
//! or unknown token means an anonymous caller.

use axum::extract::FromRequestParts;
use http::{header::AUTHORIZATION, request::Parts};
use uuid::Uuid;

use crate::{error::AppError, models::User, state::AppState};

/// The caller, if any.
pub struct CurrentUser(pub Option<User>);

/// An authenticated caller. Anonymous requests are rejected with a redirect
/// to the login page that returns to the requested path.
pub struct RequireUser(pub User);

/// An authenticated staff member.
pub struct RequireStaff(pub User);

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(CurrentUser(state.store.user_by_token(token).await?)),
            None => Ok(CurrentUser(None)),
        }
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        user.map(RequireUser).ok_or_else(|| AppError::AuthenticationRequired {
            login_url: state.config.login_url.clone(),
            next: parts.uri.path().to_string(),
        })
    }
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Forbidden);
        }
        Ok(RequireStaff(user))
    }
}
