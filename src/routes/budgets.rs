use axum::{extract::State, http::StatusCode, Extension, Json};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::extract::{IdPath, JsonBody};
use super::validation::{self, Payload, ValidationErrors};
use crate::constants::MSG_BUDGET_DELETED;
use crate::error::{AppError, Result};
use crate::models::{AuthUser, Budget};
use crate::AppState;

/// Actions gated by the owner-only budget policy
#[derive(Debug, Clone, Copy)]
enum Ability {
    View,
    Update,
    Delete,
}

/// Load a budget and check the caller may perform `ability` on it
///
/// 404 when the id is unknown, 403 when it belongs to someone else.
async fn authorize(state: &AppState, user: &AuthUser, id: i64, ability: Ability) -> Result<Budget> {
    let budget = state
        .db
        .find_budget(id)
        .await?
        .ok_or(AppError::NotFound("Budget"))?;

    if !budget.is_owned_by(user.id) {
        tracing::warn!(
            "User {} denied {:?} on budget {} owned by {}",
            user.id,
            ability,
            budget.id,
            budget.user_id
        );
        return Err(AppError::Forbidden);
    }

    Ok(budget)
}

/// `limit`: required, numeric with at most two decimals, between zero and the column maximum
fn validate_limit(payload: &Payload) -> Result<Decimal> {
    let mut errors = ValidationErrors::new();

    let limit = validation::required(&mut errors, payload, "limit")
        .and_then(|v| validation::money(&mut errors, "limit", v))
        .filter(|limit| validation::min(&mut errors, "limit", *limit, Decimal::ZERO));

    errors.finish()?;
    limit.ok_or_else(|| AppError::InvalidInput("limit is required".to_string()))
}

/// GET /api/v1/budgets
pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Budget>>> {
    Ok(Json(state.db.list_budgets(user.id).await?))
}

/// POST /api/v1/budgets
pub async fn store(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<(StatusCode, Json<Budget>)> {
    let limit = validate_limit(&payload)?;
    let budget = state.db.create_budget(user.id, limit).await?;

    tracing::info!("Budget {} created for user {}", budget.id, user.id);

    Ok((StatusCode::CREATED, Json(budget)))
}

/// GET /api/v1/budgets/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Budget>> {
    Ok(Json(authorize(&state, &user, id, Ability::View).await?))
}

/// PUT /api/v1/budgets/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    IdPath(id): IdPath<i64>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<Json<Budget>> {
    let budget = authorize(&state, &user, id, Ability::Update).await?;
    let limit = validate_limit(&payload)?;

    let budget = state
        .db
        .update_budget(budget.id, limit)
        .await?
        .ok_or(AppError::NotFound("Budget"))?;

    tracing::info!("Budget {} updated by user {}", budget.id, user.id);

    Ok(Json(budget))
}

/// DELETE /api/v1/budgets/:id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Value>> {
    let budget = authorize(&state, &user, id, Ability::Delete).await?;
    state.db.delete_budget(budget.id).await?;

    tracing::info!("Budget {} deleted by user {}", budget.id, user.id);

    Ok(Json(json!({ "message": MSG_BUDGET_DELETED })))
}
