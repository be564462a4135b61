use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use super::{BudgetStore, CategoryStore, ExpenseStore, Store, TokenStore, UserStore};
use crate::error::{AppError, Result};
use crate::models::{
    AccessToken, Budget, Category, Expense, ExpenseChanges, NewExpense, NewUser, User,
};

/// Create a PostgreSQL connection pool
pub async fn create_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    tracing::info!("Creating database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Surface schema constraint violations as conflicts, everything else as 500
fn map_constraint(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        let code = db_err.code();
        match code.as_deref() {
            Some(UNIQUE_VIOLATION)
            | Some(FOREIGN_KEY_VIOLATION)
            | Some(CHECK_VIOLATION)
            | Some(STRING_DATA_RIGHT_TRUNCATION)
            | Some(NUMERIC_VALUE_OUT_OF_RANGE) => {
                return AppError::Conflict(db_err.message().to_string());
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";
const BUDGET_COLUMNS: &str = r#"id, user_id, "limit", created_at, updated_at"#;
const CATEGORY_COLUMNS: &str = "id, name, created_at, updated_at";
const EXPENSE_COLUMNS: &str =
    r#"id, user_id, category_id, title, amount, "date", created_at, updated_at"#;

/// PostgreSQL-backed store using runtime-checked queries
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn create_token(&self, token: AccessToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO access_tokens (token_hash, user_id, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_constraint)?;

        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<AccessToken>> {
        Ok(sqlx::query_as::<_, AccessToken>(
            "SELECT token_hash, user_id, expires_at, created_at \
             FROM access_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_token(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BudgetStore for PgStore {
    async fn list_budgets(&self, user_id: i64) -> Result<Vec<Budget>> {
        let sql = format!(
            "SELECT {} FROM budgets WHERE user_id = $1 ORDER BY id",
            BUDGET_COLUMNS
        );
        Ok(sqlx::query_as::<_, Budget>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_budget(&self, user_id: i64, limit: Decimal) -> Result<Budget> {
        let sql = format!(
            r#"INSERT INTO budgets (user_id, "limit") VALUES ($1, $2) RETURNING {}"#,
            BUDGET_COLUMNS
        );
        sqlx::query_as::<_, Budget>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_one(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn find_budget(&self, id: i64) -> Result<Option<Budget>> {
        let sql = format!("SELECT {} FROM budgets WHERE id = $1", BUDGET_COLUMNS);
        Ok(sqlx::query_as::<_, Budget>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_budget(&self, id: i64, limit: Decimal) -> Result<Option<Budget>> {
        let sql = format!(
            r#"UPDATE budgets SET "limit" = $2, updated_at = NOW() WHERE id = $1 RETURNING {}"#,
            BUDGET_COLUMNS
        );
        sqlx::query_as::<_, Budget>(&sql)
            .bind(id)
            .bind(limit)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn delete_budget(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM budgets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {} FROM categories ORDER BY id", CATEGORY_COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn category_name_taken(&self, name: &str, except: Option<i64>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories \
             WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let sql = format!(
            "INSERT INTO categories (name) VALUES ($1) RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn update_category(&self, id: i64, name: &str) -> Result<Option<Category>> {
        let sql = format!(
            "UPDATE categories SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ExpenseStore for PgStore {
    async fn list_expenses(&self, user_id: i64) -> Result<Vec<Expense>> {
        let sql = format!(
            "SELECT {} FROM expenses WHERE user_id = $1 ORDER BY id",
            EXPENSE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Expense>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_expense(&self, user_id: i64, expense: NewExpense) -> Result<Expense> {
        let sql = format!(
            r#"INSERT INTO expenses (user_id, category_id, title, amount, "date")
               VALUES ($1, $2, $3, $4, $5) RETURNING {}"#,
            EXPENSE_COLUMNS
        );
        sqlx::query_as::<_, Expense>(&sql)
            .bind(user_id)
            .bind(expense.category_id)
            .bind(&expense.title)
            .bind(expense.amount)
            .bind(expense.date)
            .fetch_one(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn find_expense(&self, user_id: i64, id: i64) -> Result<Option<Expense>> {
        let sql = format!(
            "SELECT {} FROM expenses WHERE id = $1 AND user_id = $2",
            EXPENSE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Expense>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_expense(
        &self,
        user_id: i64,
        id: i64,
        changes: ExpenseChanges,
    ) -> Result<Option<Expense>> {
        // $3 says whether category_id was provided at all, so null can clear it
        let sql = format!(
            r#"UPDATE expenses SET
                   category_id = CASE WHEN $3 THEN $4 ELSE category_id END,
                   title = COALESCE($5, title),
                   amount = COALESCE($6, amount),
                   "date" = COALESCE($7, "date"),
                   updated_at = NOW()
               WHERE id = $1 AND user_id = $2
               RETURNING {}"#,
            EXPENSE_COLUMNS
        );
        sqlx::query_as::<_, Expense>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(changes.category_id.is_some())
            .bind(changes.category_id.flatten())
            .bind(changes.title)
            .bind(changes.amount)
            .bind(changes.date)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_constraint)
    }

    async fn delete_expense(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
