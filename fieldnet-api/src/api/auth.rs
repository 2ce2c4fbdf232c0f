//! Bearer token authentication
//!
//! Handlers opt in through extractors rather than a route layer:
//! `AuthUser` requires a valid access token, `AdminUser` additionally
//! requires `is_admin`, and `OptionalUser` accepts anonymous requests
//! while still rejecting a bad token.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    Json,
};
use fieldnet_common::auth::{TokenError, TokenKind};
use fieldnet_common::db::User;
use fieldnet_common::validation::Fields;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::payload::Payload;
use super::users::normalize_email;
use crate::db::users;
use crate::{error::ApiError, ApiResult, AppState};

const NOT_PROVIDED: &str = "Authentication credentials were not provided.";
const MALFORMED_HEADER: &str = "Authorization header must contain two space-delimited values";
const INVALID_TOKEN: &str = "Given token not valid for any token type";
const USER_NOT_FOUND: &str = "User not found";
const NO_ACCOUNT: &str = "No active account found with the given credentials";
const FORBIDDEN: &str = "You do not have permission to perform this action.";

/// An authenticated, active user
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// An authenticated admin
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// The caller, when a token was sent
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

/// Resolve the bearer token of a request, if any
async fn bearer_user(parts: &Parts, state: &AppState) -> Result<Option<User>, ApiError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized(MALFORMED_HEADER.to_string()))?;
    let mut words = value.split_whitespace();
    let token = match (words.next(), words.next(), words.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => token,
        (Some(scheme), _, _) if !scheme.eq_ignore_ascii_case("bearer") => return Ok(None),
        _ => return Err(ApiError::Unauthorized(MALFORMED_HEADER.to_string())),
    };

    let claims = state.auth.verify(token, TokenKind::Access).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::Unauthorized(INVALID_TOKEN.to_string())
    })?;

    match users::get(&state.db, claims.sub).await? {
        Some(user) if user.is_active => Ok(Some(user)),
        _ => Err(ApiError::Unauthorized(USER_NOT_FOUND.to_string())),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_user(parts, state)
            .await?
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized(NOT_PROVIDED.to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.is_admin || user.is_superuser {
            Ok(AdminUser(user))
        } else {
            Err(ApiError::Forbidden(FORBIDDEN.to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(bearer_user(parts, state).await?))
    }
}

/// POST /api/auth/login/
///
/// Exchange email and password for an access/refresh token pair.
pub async fn login(State(state): State<AppState>, Payload(body): Payload) -> ApiResult<Json<Value>> {
    let mut f = Fields::new(&body);
    let email = f.string("email", 255);
    let password = f.string("password", 128);
    f.finish().map_err(ApiError::Fields)?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::Unauthorized(NO_ACCOUNT.to_string()));
    };

    let user = users::get_by_email(&state.db, &normalize_email(&email))
        .await?
        .filter(|user| user.is_active)
        .filter(|user| state.auth.verify_password(&password, &user.password_hash))
        .ok_or_else(|| ApiError::Unauthorized(NO_ACCOUNT.to_string()))?;

    let access = state.auth.issue(user.id, TokenKind::Access)?;
    let refresh = state.auth.issue(user.id, TokenKind::Refresh)?;
    users::touch_last_login(&state.db, user.id).await?;

    info!(user_id = user.id, "User logged in");

    Ok(Json(json!({
        "access": access,
        "refresh": refresh,
        "user": user,
    })))
}

/// POST /api/auth/refresh/
pub async fn refresh(State(state): State<AppState>, Payload(body): Payload) -> ApiResult<Json<Value>> {
    let mut f = Fields::new(&body);
    let token = f.string("refresh", 4096);
    f.finish().map_err(ApiError::Fields)?;
    let token = token.unwrap_or_default();

    let claims = state
        .auth
        .verify(&token, TokenKind::Refresh)
        .map_err(|e| {
            if e != TokenError::Expired {
                debug!("Rejected refresh token: {}", e);
            }
            ApiError::Unauthorized("Token is invalid or expired".to_string())
        })?;

    match users::get(&state.db, claims.sub).await? {
        Some(user) if user.is_active => {}
        _ => return Err(ApiError::Unauthorized(USER_NOT_FOUND.to_string())),
    }

    let access = state.auth.issue(claims.sub, TokenKind::Access)?;
    Ok(Json(json!({ "access": access })))
}
