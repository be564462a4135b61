use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{BudgetStore, CategoryStore, ExpenseStore, Store, TokenStore, UserStore};
use crate::constants::{money_max, MAX_STRING_LENGTH, MONEY_SCALE};
use crate::error::{AppError, Result};
use crate::models::{
    AccessToken, Budget, Category, Expense, ExpenseChanges, NewExpense, NewUser, User,
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tokens: HashMap<String, AccessToken>,
    budgets: BTreeMap<i64, Budget>,
    categories: BTreeMap<i64, Category>,
    expenses: BTreeMap<i64, Expense>,
    sequences: Sequences,
}

/// Per-table id counters, starting at 1 like a SERIAL column
#[derive(Default)]
struct Sequences {
    users: i64,
    budgets: i64,
    categories: i64,
    expenses: i64,
}

fn next(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

/// In-process store mirroring the PostgreSQL schema constraints
///
/// Used by the test suite and for local development with `DATABASE_URL=memory://`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_title_width(title: &str) -> Result<()> {
    if title.chars().count() > MAX_STRING_LENGTH {
        return Err(AppError::Conflict(
            "Value too long for column expenses.title".to_string(),
        ));
    }
    Ok(())
}

/// Round and range-check a value the way a NUMERIC(12, 2) column stores it
fn fit_money_column(column: &str, value: Decimal) -> Result<Decimal> {
    let mut stored =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if stored.abs() > money_max() {
        return Err(AppError::Conflict(format!(
            "Numeric field overflow for {}",
            column
        )));
    }
    stored.rescale(MONEY_SCALE);
    Ok(stored)
}

fn check_budget_limit(limit: Decimal) -> Result<Decimal> {
    let limit = fit_money_column("budgets.limit", limit)?;
    if limit < Decimal::ZERO {
        return Err(AppError::Conflict(
            "Budget limit must not be negative".to_string(),
        ));
    }
    Ok(limit)
}

fn check_category_reference(tables: &Tables, category_id: Option<i64>) -> Result<()> {
    match category_id {
        Some(id) if !tables.categories.contains_key(&id) => Err(AppError::Conflict(format!(
            "Category {} does not exist",
            id
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let record = User {
            id: next(&mut tables.sequences.users),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create_token(&self, token: AccessToken) -> Result<()> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&token.user_id) {
            return Err(AppError::Conflict(format!(
                "User {} does not exist",
                token.user_id
            )));
        }

        tables.tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<AccessToken>> {
        Ok(self.tables.read().await.tokens.get(token_hash).cloned())
    }

    async fn delete_token(&self, token_hash: &str) -> Result<bool> {
        Ok(self.tables.write().await.tokens.remove(token_hash).is_some())
    }
}

#[async_trait]
impl BudgetStore for MemoryStore {
    async fn list_budgets(&self, user_id: i64) -> Result<Vec<Budget>> {
        let tables = self.tables.read().await;
        Ok(tables
            .budgets
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_budget(&self, user_id: i64, limit: Decimal) -> Result<Budget> {
        let limit = check_budget_limit(limit)?;
        let mut tables = self.tables.write().await;

        let now = Utc::now();
        let budget = Budget {
            id: next(&mut tables.sequences.budgets),
            user_id,
            limit,
            created_at: now,
            updated_at: now,
        };
        tables.budgets.insert(budget.id, budget.clone());

        Ok(budget)
    }

    async fn find_budget(&self, id: i64) -> Result<Option<Budget>> {
        Ok(self.tables.read().await.budgets.get(&id).cloned())
    }

    async fn update_budget(&self, id: i64, limit: Decimal) -> Result<Option<Budget>> {
        let limit = check_budget_limit(limit)?;
        let mut tables = self.tables.write().await;
        Ok(tables.budgets.get_mut(&id).map(|budget| {
            budget.limit = limit;
            budget.updated_at = Utc::now();
            budget.clone()
        }))
    }

    async fn delete_budget(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.budgets.remove(&id).is_some())
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn category_name_taken(&self, name: &str, except: Option<i64>) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except))
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let mut tables = self.tables.write().await;

        if tables.categories.values().any(|c| c.name == name) {
            return Err(AppError::Conflict(format!(
                "Category name '{}' already exists",
                name
            )));
        }

        let now = Utc::now();
        let category = Category {
            id: next(&mut tables.sequences.categories),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(category.id, category.clone());

        Ok(category)
    }

    async fn update_category(&self, id: i64, name: &str) -> Result<Option<Category>> {
        let mut tables = self.tables.write().await;

        if tables
            .categories
            .values()
            .any(|c| c.name == name && c.id != id)
        {
            return Err(AppError::Conflict(format!(
                "Category name '{}' already exists",
                name
            )));
        }

        Ok(tables.categories.get_mut(&id).map(|category| {
            category.name = name.to_string();
            category.updated_at = Utc::now();
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;

        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }

        // ON DELETE SET NULL
        for expense in tables.expenses.values_mut() {
            if expense.category_id == Some(id) {
                expense.category_id = None;
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn list_expenses(&self, user_id: i64) -> Result<Vec<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_expense(&self, user_id: i64, expense: NewExpense) -> Result<Expense> {
        let mut tables = self.tables.write().await;

        check_title_width(&expense.title)?;
        check_category_reference(&tables, expense.category_id)?;
        let amount = fit_money_column("expenses.amount", expense.amount)?;

        let now = Utc::now();
        let record = Expense {
            id: next(&mut tables.sequences.expenses),
            user_id,
            category_id: expense.category_id,
            title: expense.title,
            amount,
            date: expense.date,
            created_at: now,
            updated_at: now,
        };
        tables.expenses.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_expense(&self, user_id: i64, id: i64) -> Result<Option<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .get(&id)
            .filter(|e| e.user_id == user_id)
            .cloned())
    }

    async fn update_expense(
        &self,
        user_id: i64,
        id: i64,
        mut changes: ExpenseChanges,
    ) -> Result<Option<Expense>> {
        let mut tables = self.tables.write().await;

        if let Some(amount) = changes.amount {
            changes.amount = Some(fit_money_column("expenses.amount", amount)?);
        }
        if let Some(title) = &changes.title {
            check_title_width(title)?;
        }
        if let Some(category_id) = changes.category_id {
            check_category_reference(&tables, category_id)?;
        }

        Ok(tables
            .expenses
            .get_mut(&id)
            .filter(|e| e.user_id == user_id)
            .map(|expense| {
                changes.apply(expense);
                expense.updated_at = Utc::now();
                expense.clone()
            }))
    }

    async fn delete_expense(&self, user_id: i64, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let owned = tables
            .expenses
            .get(&id)
            .is_some_and(|e| e.user_id == user_id);
        if owned {
            tables.expenses.remove(&id);
        }

        Ok(owned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
