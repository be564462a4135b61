use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Bearer token record. Only the keyed digest of the token is kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Authenticated principal passed explicitly into every controller operation
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Digest of the token presented with the current request
    pub token_hash: String,
}

impl AuthUser {
    pub fn new(user: &User, token_hash: String) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            token_hash,
        }
    }
}
