use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single spending entry owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub category_id: Option<i64>,
    pub title: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

/// Partial update. `None` leaves a column untouched; for `category_id`,
/// `Some(None)` clears the reference.
#[derive(Debug, Clone, Default)]
pub struct ExpenseChanges {
    pub category_id: Option<Option<i64>>,
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
}

impl ExpenseChanges {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.title.is_none()
            && self.amount.is_none()
            && self.date.is_none()
    }

    /// Apply the provided fields onto an existing record
    pub fn apply(&self, expense: &mut Expense) {
        if let Some(category_id) = self.category_id {
            expense.category_id = category_id;
        }
        if let Some(title) = &self.title {
            expense.title = title.clone();
        }
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(date) = self.date {
            expense.date = date;
        }
    }
}
