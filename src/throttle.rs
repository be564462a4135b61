use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
    Extension,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::AuthUser;

/// Purge stale windows once the table grows past this many keys
const SWEEP_THRESHOLD: usize = 10_000;

/// Request counter for one key within the current window
#[derive(Debug, Clone)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request limiter for one resource group
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request for `key`, returning how many remain in the window
    /// Returns Err(RateLimitExceeded) once the quota is used up
    pub async fn hit(&self, key: &str) -> Result<u32> {
        self.hit_at(key, Instant::now()).await
    }

    async fn hit_at(&self, key: &str, now: Instant) -> Result<u32> {
        let mut windows = self.windows.lock().await;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| now < w.reset_at);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        // Reset counter if the window has expired
        if now >= window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        if window.count >= self.max_requests {
            tracing::warn!(
                "{} rate limit exceeded for {}: {}/{}",
                self.name,
                key,
                window.count,
                self.max_requests
            );
            return Err(AppError::RateLimitExceeded);
        }

        window.count += 1;
        Ok(self.max_requests - window.count)
    }
}

/// One limiter per throttled resource group
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub expenses: Arc<RateLimiter>,
    pub categories: Arc<RateLimiter>,
    pub budgets: Arc<RateLimiter>,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Self {
        let window = config.rate_limit_window();
        Self {
            expenses: Arc::new(RateLimiter::new(
                "expenses",
                config.expenses_rate_limit,
                window,
            )),
            categories: Arc::new(RateLimiter::new(
                "categories",
                config.categories_rate_limit,
                window,
            )),
            budgets: Arc::new(RateLimiter::new(
                "budgets",
                config.budgets_rate_limit,
                window,
            )),
        }
    }
}

/// Throttle middleware, keyed by the authenticated user
///
/// Must run after authentication so the principal is in the request extensions.
pub async fn throttle(
    State(limiter): State<Arc<RateLimiter>>,
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let remaining = limiter.hit(&format!("user:{}", user.id)).await?;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));

    Ok(response)
}
