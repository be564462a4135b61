use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{AccessToken, AuthUser, User};
use crate::security::{digest_token, generate_token, parse_bearer};
use crate::AppState;

/// Token payload returned by login and refresh
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

/// Issue and persist a new bearer token for `user`
pub async fn issue_token(state: &AppState, user: User) -> Result<IssuedToken> {
    let token = generate_token();
    let now = Utc::now();
    let ttl = state.config.token_ttl_secs;

    let expires_at = i64::try_from(ttl)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    state
        .db
        .create_token(AccessToken {
            token_hash: digest_token(&token, &state.config.app_secret_key),
            user_id: user.id,
            expires_at,
            created_at: now,
        })
        .await?;

    tracing::info!("Issued token for user {}", user.id);

    Ok(IssuedToken {
        access_token: token,
        token_type: "bearer",
        expires_in: ttl,
        user,
    })
}

/// Resolve a presented bearer token to its user
///
/// Expired tokens are deleted on sight.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser> {
    let token_hash = digest_token(token, &state.config.app_secret_key);

    let record = state
        .db
        .find_token(&token_hash)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if record.is_expired(Utc::now()) {
        tracing::info!("Rejecting expired token for user {}", record.user_id);
        state.db.delete_token(&token_hash).await?;
        return Err(AppError::Unauthenticated);
    }

    let user = state
        .db
        .find_user(record.user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(AuthUser::new(&user, token_hash))
}

/// Authentication middleware
///
/// Puts the resolved [`AuthUser`] into the request extensions; rejects with 401
/// when the header is missing, malformed, unknown or expired.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .ok_or(AppError::Unauthenticated)?
        .to_string();

    let user = authenticate(&state, &token).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
