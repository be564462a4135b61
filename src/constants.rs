/// Lifetime of cached category entries (1 hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Lifetime of an issued bearer token (1 hour)
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Throttle window shared by every resource group
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Requests per window per user, by resource group.
/// Expenses are written far more often than budgets.
pub const DEFAULT_EXPENSES_RATE_LIMIT: u32 = 100;
pub const DEFAULT_CATEGORIES_RATE_LIMIT: u32 = 60;
pub const DEFAULT_BUDGETS_RATE_LIMIT: u32 = 30;

/// Width of the VARCHAR columns (category name, expense title)
pub const MAX_STRING_LENGTH: usize = 255;

/// Fractional digits kept by the NUMERIC(12, 2) money columns
pub const MONEY_SCALE: u32 = 2;

/// Integer digits allowed by the NUMERIC(12, 2) money columns
pub const MONEY_INTEGER_DIGITS: u32 = 10;

/// Largest magnitude a money column can hold (9999999999.99)
pub fn money_max() -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(10i64.pow(MONEY_INTEGER_DIGITS + MONEY_SCALE) - 1, MONEY_SCALE)
}

/// Size of a freshly generated bearer token, before hex encoding
pub const TOKEN_BYTES: usize = 32;

// =============================================================================
// Cache Keys
// =============================================================================

/// Cache key holding the full category collection
pub const CATEGORIES_CACHE_KEY: &str = "categories";

/// Cache key holding a single category
pub fn category_cache_key(id: i64) -> String {
    format!("category_{}", id)
}

// =============================================================================
// Messages
// =============================================================================

pub const MSG_TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";

pub const MSG_UNAUTHENTICATED: &str = "Unauthenticated.";

pub const MSG_FORBIDDEN: &str = "This action is unauthorized.";

pub const MSG_BUDGET_DELETED: &str = "Budget deleted successfully";

pub const MSG_CATEGORY_DELETED: &str = "Category deleted successfully";

pub const MSG_EXPENSE_DELETED: &str = "Expense deleted successfully";
