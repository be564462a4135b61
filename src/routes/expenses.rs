use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};

use super::extract::{IdPath, JsonBody};
use super::validation::{self, Payload, ValidationErrors};
use crate::constants::MSG_EXPENSE_DELETED;
use crate::error::{AppError, Result};
use crate::models::{AuthUser, Expense, ExpenseChanges, NewExpense};
use crate::AppState;

/// Full rule set for a new expense
///
/// `category_id` may be null or absent, but must name an existing category
/// when given.
async fn validate_new_expense(state: &AppState, payload: &Payload) -> Result<NewExpense> {
    let mut errors = ValidationErrors::new();

    let mut category_id = None;
    if let Some(value) = validation::nullable(payload, "category_id") {
        if let Some(id) = validation::integer(&mut errors, "category_id", value) {
            if state.db.find_category(id).await?.is_some() {
                category_id = Some(id);
            } else {
                validation::invalid_selection(&mut errors, "category_id");
            }
        }
    }

    let title = validation::required_string(&mut errors, payload, "title");
    let amount = validation::required(&mut errors, payload, "amount")
        .and_then(|v| validation::money(&mut errors, "amount", v));
    let date = validation::required(&mut errors, payload, "date")
        .and_then(|v| validation::date(&mut errors, "date", v));

    errors.finish()?;

    match (title, amount, date) {
        (Some(title), Some(amount), Some(date)) => Ok(NewExpense {
            category_id,
            title,
            amount,
            date,
        }),
        _ => Err(AppError::InvalidInput("Incomplete expense".to_string())),
    }
}

/// Read whichever fields were sent, converting types only
///
/// Titles are trimmed like every other input string. The create rules (title
/// width, category existence, two-decimal amounts) are not applied here; the
/// store's own constraints are the only guard.
fn read_changes(payload: &Payload) -> Result<ExpenseChanges> {
    let mut changes = ExpenseChanges::default();

    if payload.contains("category_id") {
        changes.category_id = Some(match validation::nullable(payload, "category_id") {
            None => None,
            Some(value) => Some(validation::as_id(value).ok_or_else(|| malformed("category_id"))?),
        });
    }

    if let Some(value) = validation::nullable(payload, "title") {
        let title = value.as_str().ok_or_else(|| malformed("title"))?;
        changes.title = Some(title.trim().to_string());
    }

    if let Some(value) = validation::nullable(payload, "amount") {
        changes.amount = Some(validation::as_decimal(value).ok_or_else(|| malformed("amount"))?);
    }

    if let Some(value) = validation::nullable(payload, "date") {
        changes.date = Some(validation::as_date(value).ok_or_else(|| malformed("date"))?);
    }

    Ok(changes)
}

fn malformed(field: &str) -> AppError {
    AppError::InvalidInput(format!("Malformed value for {}", field))
}

/// GET /api/v1/expenses
pub async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Expense>>> {
    Ok(Json(state.db.list_expenses(user.id).await?))
}

/// POST /api/v1/expenses
pub async fn store(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<(StatusCode, Json<Expense>)> {
    let expense = validate_new_expense(&state, &payload).await?;
    let expense = state.db.create_expense(user.id, expense).await?;

    tracing::info!("Expense {} created for user {}", expense.id, user.id);

    Ok((StatusCode::CREATED, Json(expense)))
}

/// GET /api/v1/expenses/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Expense>> {
    let expense = state
        .db
        .find_expense(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Expense"))?;

    Ok(Json(expense))
}

/// PUT /api/v1/expenses/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    IdPath(id): IdPath<i64>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<Json<Expense>> {
    let expense = state
        .db
        .find_expense(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Expense"))?;

    let changes = read_changes(&payload)?;
    if changes.is_empty() {
        return Ok(Json(expense));
    }

    let expense = state
        .db
        .update_expense(user.id, expense.id, changes)
        .await?
        .ok_or(AppError::NotFound("Expense"))?;

    tracing::info!("Expense {} updated by user {}", expense.id, user.id);

    Ok(Json(expense))
}

/// DELETE /api/v1/expenses/:id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Value>> {
    if !state.db.delete_expense(user.id, id).await? {
        return Err(AppError::NotFound("Expense"));
    }

    tracing::info!("Expense {} deleted by user {}", id, user.id);

    Ok(Json(json!({ "message": MSG_EXPENSE_DELETED })))
}
