use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::extract::{IdPath, JsonBody};
use super::validation::{self, Payload, ValidationErrors};
use crate::constants::{category_cache_key, CATEGORIES_CACHE_KEY, MSG_CATEGORY_DELETED};
use crate::error::{AppError, Result};
use crate::models::Category;
use crate::AppState;

// Categories are a shared taxonomy: any authenticated user may manage them,
// so none of these handlers looks at the caller.

/// `name`: required, string, at most 255 characters, unique apart from `except`
async fn validate_name(state: &AppState, payload: &Payload, except: Option<i64>) -> Result<String> {
    let mut errors = ValidationErrors::new();

    let name = validation::required_string(&mut errors, payload, "name");
    if let Some(name) = &name {
        if state.db.category_name_taken(name, except).await? {
            validation::unique_taken(&mut errors, "name");
        }
    }

    errors.finish()?;
    name.ok_or_else(|| AppError::InvalidInput("name is required".to_string()))
}

/// Drop every cache entry that may hold category `id`
async fn forget_category(state: &AppState, id: i64) {
    state.categories.invalidate(CATEGORIES_CACHE_KEY).await;
    state.categories.invalidate(&category_cache_key(id)).await;
}

/// GET /api/v1/categories
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let db = state.db.clone();
    let categories = state
        .categories
        .get(
            CATEGORIES_CACHE_KEY,
            || async move { db.list_categories().await },
            state.config.cache_ttl(),
        )
        .await?;

    Ok(Json(categories))
}

/// POST /api/v1/categories
pub async fn store(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<(StatusCode, Json<Category>)> {
    let name = validate_name(&state, &payload, None).await?;
    let category = state.db.create_category(&name).await?;

    state.categories.invalidate(CATEGORIES_CACHE_KEY).await;
    tracing::info!("Category {} created: {}", category.id, category.name);

    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories/:id
pub async fn show(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Category>> {
    let db = state.db.clone();
    let category = state
        .categories
        .get(
            &category_cache_key(id),
            || async move {
                db.find_category(id)
                    .await?
                    .ok_or(AppError::NotFound("Category"))
            },
            state.config.cache_ttl(),
        )
        .await?;

    Ok(Json(category))
}

/// PUT /api/v1/categories/:id
pub async fn update(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<Json<Category>> {
    let name = validate_name(&state, &payload, Some(id)).await?;

    let category = state
        .db
        .update_category(id, &name)
        .await?
        .ok_or(AppError::NotFound("Category"))?;

    forget_category(&state, id).await;
    tracing::info!("Category {} renamed to {}", category.id, category.name);

    Ok(Json(category))
}

/// DELETE /api/v1/categories/:id
pub async fn destroy(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Value>> {
    if !state.db.delete_category(id).await? {
        return Err(AppError::NotFound("Category"));
    }

    forget_category(&state, id).await;
    tracing::info!("Category {} deleted", id);

    Ok(Json(json!({ "message": MSG_CATEGORY_DELETED })))
}
