use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared expense category. Names are unique across all users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
