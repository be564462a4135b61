pub mod auth;
pub mod budgets;
pub mod categories;
pub mod expenses;
pub mod extract;
pub mod health;
pub mod validation;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::require_auth;
use crate::throttle::throttle;
use crate::AppState;

pub use health::health_check;

/// Build the full application router
///
/// Authentication wraps the throttles, so limits are counted per user and
/// anonymous requests are rejected before they use any quota.
pub fn router(state: AppState) -> Router {
    let limits = state.limits.clone();

    let expense_routes = Router::new()
        .route("/expenses", get(expenses::index).post(expenses::store))
        .route(
            "/expenses/:id",
            get(expenses::show)
                .put(expenses::update)
                .patch(expenses::update)
                .delete(expenses::destroy),
        )
        .route_layer(middleware::from_fn_with_state(limits.expenses, throttle));

    let category_routes = Router::new()
        .route("/categories", get(categories::index).post(categories::store))
        .route(
            "/categories/:id",
            get(categories::show)
                .put(categories::update)
                .patch(categories::update)
                .delete(categories::destroy),
        )
        .route_layer(middleware::from_fn_with_state(limits.categories, throttle));

    let budget_routes = Router::new()
        .route("/budgets", get(budgets::index).post(budgets::store))
        .route(
            "/budgets/:id",
            get(budgets::show)
                .put(budgets::update)
                .patch(budgets::update)
                .delete(budgets::destroy),
        )
        .route_layer(middleware::from_fn_with_state(limits.budgets, throttle));

    let v1 = Router::new()
        .merge(expense_routes)
        .merge(category_routes)
        .merge(budget_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let protected_auth = Router::new()
        .route("/logout", post(auth::logout))
        .route("/refresh", post(auth::refresh))
        .route("/profile", get(auth::profile))
        .route("/user", get(auth::profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(protected_auth);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1)
        .nest("/api/auth", auth_routes)
        .with_state(state)
}
