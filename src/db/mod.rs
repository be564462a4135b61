pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    AccessToken, Budget, Category, Expense, ExpenseChanges, NewExpense, NewUser, User,
};

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Store handle type (Arc-wrapped for sharing across handlers)
pub type Db = Arc<dyn Store>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: i64) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create_token(&self, token: AccessToken) -> Result<()>;
    async fn find_token(&self, token_hash: &str) -> Result<Option<AccessToken>>;
    async fn delete_token(&self, token_hash: &str) -> Result<bool>;
}

#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn list_budgets(&self, user_id: i64) -> Result<Vec<Budget>>;
    async fn create_budget(&self, user_id: i64, limit: Decimal) -> Result<Budget>;
    /// Unscoped lookup; ownership is decided by the caller's policy check
    async fn find_budget(&self, id: i64) -> Result<Option<Budget>>;
    async fn update_budget(&self, id: i64, limit: Decimal) -> Result<Option<Budget>>;
    async fn delete_budget(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn find_category(&self, id: i64) -> Result<Option<Category>>;
    /// Whether `name` is used by any category other than `except`
    async fn category_name_taken(&self, name: &str, except: Option<i64>) -> Result<bool>;
    /// Fails with `Conflict` on a duplicate name
    async fn create_category(&self, name: &str) -> Result<Category>;
    async fn update_category(&self, id: i64, name: &str) -> Result<Option<Category>>;
    /// Expenses referencing the category keep existing with a null category
    async fn delete_category(&self, id: i64) -> Result<bool>;
}

/// Every expense query is scoped to its owner
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn list_expenses(&self, user_id: i64) -> Result<Vec<Expense>>;
    /// Fails with `Conflict` when the category reference or title width is violated
    async fn create_expense(&self, user_id: i64, expense: NewExpense) -> Result<Expense>;
    async fn find_expense(&self, user_id: i64, id: i64) -> Result<Option<Expense>>;
    async fn update_expense(
        &self,
        user_id: i64,
        id: i64,
        changes: ExpenseChanges,
    ) -> Result<Option<Expense>>;
    async fn delete_expense(&self, user_id: i64, id: i64) -> Result<bool>;
}

/// Everything the handlers need from persistence
#[async_trait]
pub trait Store: UserStore + TokenStore + BudgetStore + CategoryStore + ExpenseStore {
    fn backend(&self) -> &'static str;

    /// Liveness probe used by the health endpoint
    async fn ping(&self) -> Result<()>;
}

/// Open the store named by `database_url`
///
/// `postgres://` URLs connect a pool and run pending migrations;
/// `memory://` keeps everything in process and is lost on restart.
pub async fn connect(database_url: &str) -> anyhow::Result<Db> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let pool = create_pool(database_url).await?;

        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations complete");

        return Ok(Arc::new(PgStore::new(pool)));
    }

    if database_url.starts_with("memory://") {
        tracing::warn!("Using in-memory store: data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    anyhow::bail!("Unsupported DATABASE_URL scheme: {}", database_url)
}
