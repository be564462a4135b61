//! Expense Tracker API Library
//!
//! Budgets, categories and expenses behind bearer-token authentication.
//! This module exports the core types and functions for testing and reuse.

pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod throttle;

pub use cache::{CacheStore, CategoryCache, MemoryCache};
pub use config::Config;
pub use db::{connect, Db, MemoryStore, Store};
pub use error::{AppError, Result};
pub use throttle::RateLimits;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
    pub categories: CategoryCache,
    pub limits: RateLimits,
}

impl AppState {
    /// Create a new AppState with the given store, cache backend and configuration
    pub fn new(db: Db, cache: Arc<dyn CacheStore>, config: Config) -> Self {
        let limits = RateLimits::from_config(&config);
        Self {
            db,
            config,
            categories: CategoryCache::new(cache),
            limits,
        }
    }
}
