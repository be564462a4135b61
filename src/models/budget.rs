use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spending limit owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub limit: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Owner-only policy shared by view, update and delete
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}
