use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;
use serde_json::{json, Value};

use super::extract::JsonBody;
use super::validation::{self, Payload, ValidationErrors};
use crate::auth::{issue_token, IssuedToken};
use crate::error::{AppError, Result};
use crate::models::{AuthUser, NewUser, User};
use crate::security::{hash_password, verify_password};
use crate::AppState;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;
const EMAIL_MAX_CHARS: usize = 100;
const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: User,
}

/// Register a new user
///
/// Returns 422 when a field fails validation or the email is already taken.
/// The password is hashed with Argon2 off the async runtime.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let mut errors = ValidationErrors::new();

    let name = validation::required(&mut errors, &payload, "name")
        .and_then(|v| validation::string(&mut errors, "name", v, NAME_MAX_CHARS));
    if let Some(name) = &name {
        if name.chars().count() < NAME_MIN_CHARS {
            errors.add(
                "name",
                format!("The name field must be at least {} characters.", NAME_MIN_CHARS),
            );
        }
    }

    let email = validation::required(&mut errors, &payload, "email")
        .and_then(|v| validation::string(&mut errors, "email", v, EMAIL_MAX_CHARS))
        .filter(|email| validation::email(&mut errors, "email", email));
    if let Some(email) = &email {
        if state.db.find_user_by_email(email).await?.is_some() {
            validation::unique_taken(&mut errors, "email");
        }
    }

    let password = validation::required(&mut errors, &payload, "password")
        .and_then(|v| validation::secret(&mut errors, "password", v));
    if let Some(password) = &password {
        if password.chars().count() < PASSWORD_MIN_CHARS {
            errors.add(
                "password",
                format!(
                    "The password field must be at least {} characters.",
                    PASSWORD_MIN_CHARS
                ),
            );
        } else if payload.get("password_confirmation").and_then(Value::as_str)
            != Some(password.as_str())
        {
            errors.add("password", "The password field confirmation does not match.");
        }
    }

    errors.finish()?;

    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(AppError::InvalidInput("Incomplete registration".to_string()));
    };

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = state
        .db
        .create_user(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;

    tracing::info!("New user registered: {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User successfully registered",
            user,
        }),
    ))
}

/// Exchange email and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<Json<IssuedToken>> {
    let mut errors = ValidationErrors::new();
    let email = validation::required(&mut errors, &payload, "email")
        .and_then(|v| validation::string(&mut errors, "email", v, EMAIL_MAX_CHARS));
    let password = validation::required(&mut errors, &payload, "password")
        .and_then(|v| validation::secret(&mut errors, "password", v));
    errors.finish()?;

    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::InvalidCredentials);
    };

    let Some(user) = state.db.find_user_by_email(&email).await? else {
        tracing::warn!("Login attempt for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let stored_hash = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?;
    if !verified {
        tracing::warn!("Failed login for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    Ok(Json(issue_token(&state, user).await?))
}

/// Revoke the token presented with this request
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>> {
    state.db.delete_token(&user.token_hash).await?;
    tracing::info!("User {} signed out", user.id);

    Ok(Json(json!({ "message": "User successfully signed out" })))
}

/// Swap the presented token for a fresh one
pub async fn refresh(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<IssuedToken>> {
    let record = state
        .db
        .find_user(user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    state.db.delete_token(&user.token_hash).await?;

    Ok(Json(issue_token(&state, record).await?))
}

/// The authenticated user's record
pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    let record = state
        .db
        .find_user(user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Json(record))
}
