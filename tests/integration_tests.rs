//! Integration tests for the Expense Tracker API
//!
//! These tests verify the complete request/response cycle for all endpoints,
//! running the real router against the in-memory store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use expense_tracker_api::db::TokenStore;
use expense_tracker_api::security::digest_token;
use expense_tracker_api::{routes, AppState, Config, MemoryCache, MemoryStore};

// Test configuration constants
const TEST_SECRET: &str = "test-secret-key";
const TEST_PASSWORD: &str = "password123";

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a test configuration
fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: "memory://".to_string(),
        allowed_origins: vec!["http://localhost:5173".to_string()],
        environment: "test".to_string(),
        app_secret_key: TEST_SECRET.to_string(),
        token_ttl_secs: 3600,
        cache_ttl_secs: 3600,
        rate_limit_window_secs: 60,
        expenses_rate_limit: 100,
        categories_rate_limit: 60,
        budgets_rate_limit: 30,
    }
}

/// Create a test app router backed by a fresh in-memory store
fn create_test_app() -> Router {
    create_test_app_with_config(test_config()).0
}

/// Create a test app with custom config, keeping a handle on its store
fn create_test_app_with_config(config: Config) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), Arc::new(MemoryCache::new()), config);
    (routes::router(state), store)
}

/// Parse response body as JSON
async fn body_to_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Build a request, with a JSON body and bearer token when given
fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and return (status, JSON body)
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(make_request(method, uri, token, body))
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

/// Register a user and log in, returning the bearer token
async fn register_and_login(app: &Router, email: &str) -> String {
    let (status, _) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Test User",
            "email": email,
            "password": TEST_PASSWORD,
            "password_confirmation": TEST_PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    body["access_token"].as_str().unwrap().to_string()
}

async fn create_category(app: &Router, token: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/categories",
        Some(token),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn create_expense(app: &Router, token: &str, category_id: Value) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/expenses",
        Some(token),
        Some(json!({
            "category_id": category_id,
            "title": "Lunch",
            "amount": 12.5,
            "date": "2024-03-15",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check_returns_healthy() {
    let app = create_test_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["backend"], "memory");
    assert!(body["version"].as_str().is_some());
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_register_returns_user_without_password() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Jane",
            "email": "jane@example.com",
            "password": TEST_PASSWORD,
            "password_confirmation": TEST_PASSWORD,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "jane@example.com");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "J",
            "email": "not-an-email",
            "password": "123",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn test_register_duplicate_email_returns_422() {
    let app = create_test_app();
    register_and_login(&app, "dup@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Other",
            "email": "dup@example.com",
            "password": TEST_PASSWORD,
            "password_confirmation": TEST_PASSWORD,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"][0], "The email has already been taken.");
}

#[tokio::test]
async fn test_login_with_wrong_password_returns_401() {
    let app = create_test_app();
    register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "jane@example.com", "password": "wrong-password" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_returns_bearer_token() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    assert_eq!(token.len(), 64);

    let (status, body) = send(&app, "GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "jane@example.com");

    let (status, body) = send(&app, "GET", "/api/auth/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Test User");
}

#[tokio::test]
async fn test_requests_without_token_return_401() {
    let app = create_test_app();

    for uri in ["/api/v1/budgets", "/api/v1/categories", "/api/v1/expenses"] {
        let (status, body) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthenticated.");
    }

    let (status, _) = send(&app, "GET", "/api/v1/budgets", Some("bogus-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User successfully signed out");

    let (status, _) = send(&app, "GET", "/api/v1/budgets", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = create_test_app();
    let old_token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(&app, "POST", "/api/auth/refresh", Some(&old_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);
    let new_token = body["access_token"].as_str().unwrap().to_string();
    assert_ne!(new_token, old_token);

    let (status, _) = send(&app, "GET", "/api/v1/budgets", Some(&old_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/v1/budgets", Some(&new_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_rejected_and_deleted() {
    let config = Config {
        token_ttl_secs: 0,
        ..test_config()
    };
    let (app, store) = create_test_app_with_config(config);
    let token = register_and_login(&app, "jane@example.com").await;

    let token_hash = digest_token(&token, TEST_SECRET);
    assert!(store.find_token(&token_hash).await.unwrap().is_some());

    let (status, body) = send(&app, "GET", "/api/v1/budgets", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthenticated.");

    assert!(store.find_token(&token_hash).await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_trims_name_and_email_but_not_password() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "  Jane  ",
            "email": " jane@example.com ",
            "password": " secret pass ",
            "password_confirmation": " secret pass ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["name"], "Jane");
    assert_eq!(body["user"]["email"], "jane@example.com");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "jane@example.com", "password": "secret pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "jane@example.com", "password": " secret pass " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Budget Tests
// =============================================================================

#[tokio::test]
async fn test_budget_lifecycle() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/budgets",
        Some(&token),
        Some(json!({ "limit": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["limit"].as_f64(), Some(500.0));

    let (status, list) = send(&app, "GET", "/api/v1/budgets", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["limit"].as_f64(), Some(500.0));

    let uri = format!("/api/v1/budgets/{}", created["id"]);
    let (status, body) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Budget deleted successfully");

    let (_, list) = send(&app, "GET", "/api/v1/budgets", Some(&token), None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_budget_get_returns_created_limit() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    for limit in [json!(0), json!(0.01), json!(1234.56), json!("75.5")] {
        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/budgets",
            Some(&token),
            Some(json!({ "limit": limit })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "limit {}", limit);

        let uri = format!("/api/v1/budgets/{}", created["id"]);
        let (status, fetched) = send(&app, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["limit"], created["limit"]);
    }
}

#[tokio::test]
async fn test_budget_negative_limit_returns_422() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/budgets",
        Some(&token),
        Some(json!({ "limit": -1 })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["limit"][0], "The limit field must be at least 0.");
}

#[tokio::test]
async fn test_budget_missing_or_non_numeric_limit_returns_422() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    for payload in [json!({}), json!({ "limit": "lots" }), json!({ "limit": null })] {
        let (status, body) = send(&app, "POST", "/api/v1/budgets", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["limit"].is_array());
    }
}

#[tokio::test]
async fn test_budget_limit_must_fit_two_decimal_column() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    for limit in [json!("0.005"), json!(12.345)] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/budgets",
            Some(&token),
            Some(json!({ "limit": limit })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "limit {}", limit);
        assert_eq!(body["errors"]["limit"][0], "The limit field must have 0-2 decimal places.");
    }

    for limit in [json!("10000000000"), json!("12345678901234567.89")] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/budgets",
            Some(&token),
            Some(json!({ "limit": limit })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "limit {}", limit);
        assert_eq!(
            body["errors"]["limit"][0],
            "The limit field must not be greater than 9999999999.99."
        );
    }
}

#[tokio::test]
async fn test_budget_limit_near_column_maximum_round_trips_exactly() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/budgets",
        Some(&token),
        Some(json!({ "limit": "9999999999.99" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["limit"].to_string(), "9999999999.99");

    let uri = format!("/api/v1/budgets/{}", created["id"]);
    let (status, fetched) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["limit"].to_string(), "9999999999.99");
}

#[tokio::test]
async fn test_budget_update_revalidates_limit() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/budgets",
        Some(&token),
        Some(json!({ "limit": 100 })),
    )
    .await;
    let uri = format!("/api/v1/budgets/{}", created["id"]);

    let (status, _) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "limit": -5 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "limit": 250 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"].as_f64(), Some(250.0));
}

#[tokio::test]
async fn test_budget_of_other_user_is_forbidden() {
    let app = create_test_app();
    let owner = register_and_login(&app, "owner@example.com").await;
    let intruder = register_and_login(&app, "intruder@example.com").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/budgets",
        Some(&owner),
        Some(json!({ "limit": 100 })),
    )
    .await;
    let uri = format!("/api/v1/budgets/{}", created["id"]);

    let (status, body) = send(&app, "GET", &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This action is unauthorized.");

    let (status, _) = send(&app, "PUT", &uri, Some(&intruder), Some(json!({ "limit": 1 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, list) = send(&app, "GET", "/api/v1/budgets", Some(&intruder), None).await;
    assert_eq!(list, json!([]));

    let (status, body) = send(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"].as_f64(), Some(100.0));
}

#[tokio::test]
async fn test_budget_not_found() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(&app, "GET", "/api/v1/budgets/999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Budget not found");

    let (status, _) = send(&app, "GET", "/api/v1/budgets/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Category Tests
// =============================================================================

#[tokio::test]
async fn test_duplicate_category_returns_422() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    create_category(&app, &token, "Food").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/categories",
        Some(&token),
        Some(json!({ "name": "Food" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"][0], "The name has already been taken.");

    let (_, list) = send(&app, "GET", "/api/v1/categories", Some(&token), None).await;
    let food_count = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["name"] == "Food")
        .count();
    assert_eq!(food_count, 1);
}

#[tokio::test]
async fn test_category_name_rules() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    for payload in [
        json!({}),
        json!({ "name": "" }),
        json!({ "name": 42 }),
        json!({ "name": "x".repeat(256) }),
    ] {
        let (status, body) =
            send(&app, "POST", "/api/v1/categories", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["name"].is_array());
    }

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories",
        Some(&token),
        Some(json!({ "name": "x".repeat(255) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_category_name_is_trimmed_before_uniqueness_check() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let food = create_category(&app, &token, " Food ").await;
    assert_eq!(food["name"], "Food");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/categories",
        Some(&token),
        Some(json!({ "name": "Food" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"][0], "The name has already been taken.");

    create_category(&app, &token, "Rent").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories",
        Some(&token),
        Some(json!({ "name": "  Rent\t" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_category_update_to_own_name_succeeds() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let food = create_category(&app, &token, "Food").await;
    create_category(&app, &token, "Rent").await;
    let uri = format!("/api/v1/categories/{}", food["id"]);

    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "name": "Food" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Food");

    let (status, _) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "name": "Rent" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_category_reads_reflect_writes_immediately() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    // Warm both cache keys
    let (_, list) = send(&app, "GET", "/api/v1/categories", Some(&token), None).await;
    assert_eq!(list, json!([]));

    let food = create_category(&app, &token, "Food").await;
    let uri = format!("/api/v1/categories/{}", food["id"]);

    let (_, list) = send(&app, "GET", "/api/v1/categories", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, single) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(single["name"], "Food");

    // Update
    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "name": "Groceries" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, single) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(single["name"], "Groceries");
    let (_, list) = send(&app, "GET", "/api/v1/categories", Some(&token), None).await;
    assert_eq!(list[0]["name"], "Groceries");

    // Delete
    let (status, body) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Category deleted successfully");

    let (status, _) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = send(&app, "GET", "/api/v1/categories", Some(&token), None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_category_missing_returns_404() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(&app, "GET", "/api/v1/categories/42", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Category not found");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/categories/42",
        Some(&token),
        Some(json!({ "name": "Anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/42", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_categories_are_shared_between_users() {
    let app = create_test_app();
    let jane = register_and_login(&app, "jane@example.com").await;
    let john = register_and_login(&app, "john@example.com").await;

    let food = create_category(&app, &jane, "Food").await;
    let uri = format!("/api/v1/categories/{}", food["id"]);

    let (status, body) = send(&app, "PUT", &uri, Some(&john), Some(json!({ "name": "Meals" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Meals");
}

// =============================================================================
// Expense Tests
// =============================================================================

#[tokio::test]
async fn test_expense_with_null_category_succeeds() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let expense = create_expense(&app, &token, Value::Null).await;

    assert_eq!(expense["category_id"], Value::Null);
    assert_eq!(expense["title"], "Lunch");
    assert_eq!(expense["amount"].as_f64(), Some(12.5));
    assert_eq!(expense["date"], "2024-03-15");
}

#[tokio::test]
async fn test_expense_with_existing_category_succeeds() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let food = create_category(&app, &token, "Food").await;
    let expense = create_expense(&app, &token, food["id"].clone()).await;

    assert_eq!(expense["category_id"], food["id"]);
}

#[tokio::test]
async fn test_expense_with_unknown_category_returns_422() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/expenses",
        Some(&token),
        Some(json!({
            "category_id": 999,
            "title": "Lunch",
            "amount": 12.5,
            "date": "2024-03-15",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["category_id"][0], "The selected category id is invalid.");
}

#[tokio::test]
async fn test_expense_amount_keeps_exact_value() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/expenses",
        Some(&token),
        Some(json!({
            "title": "  Laptop  ",
            "amount": "-9999999999.99",
            "date": "2024-03-15",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Laptop");
    assert_eq!(created["amount"].to_string(), "-9999999999.99");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/expenses",
        Some(&token),
        Some(json!({
            "title": "Lunch",
            "amount": "1.999",
            "date": "2024-03-15",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["amount"][0], "The amount field must have 0-2 decimal places.");
}

#[tokio::test]
async fn test_expense_update_amount_is_stored_like_the_column() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let expense = create_expense(&app, &token, Value::Null).await;
    let uri = format!("/api/v1/expenses/{}", expense["id"]);

    // Update only coerces; the two-decimal column rounds
    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "amount": "0.005" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"].to_string(), "0.01");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "amount": "10000000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_expense_create_rules() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/expenses",
        Some(&token),
        Some(json!({
            "title": "x".repeat(256),
            "amount": "twelve",
            "date": "2024-13-40",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["title"].is_array());
    assert!(body["errors"]["amount"].is_array());
    assert!(body["errors"]["date"].is_array());
    assert!(body["errors"].get("category_id").is_none());

    let (status, body) = send(&app, "POST", "/api/v1/expenses", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["title"][0], "The title field is required.");
}

#[tokio::test]
async fn test_expense_of_other_user_is_not_found() {
    let app = create_test_app();
    let owner = register_and_login(&app, "owner@example.com").await;
    let intruder = register_and_login(&app, "intruder@example.com").await;

    let expense = create_expense(&app, &owner, Value::Null).await;
    let uri = format!("/api/v1/expenses/{}", expense["id"]);

    let (status, _) = send(&app, "GET", &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PUT", &uri, Some(&intruder), Some(json!({ "title": "Mine" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, "GET", "/api/v1/expenses", Some(&intruder), None).await;
    assert_eq!(list, json!([]));

    let (_, list) = send(&app, "GET", "/api/v1/expenses", Some(&owner), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_expense_partial_update() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let food = create_category(&app, &token, "Food").await;
    let expense = create_expense(&app, &token, food["id"].clone()).await;
    let uri = format!("/api/v1/expenses/{}", expense["id"]);

    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "amount": 20 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"].as_f64(), Some(20.0));
    assert_eq!(body["title"], "Lunch");
    assert_eq!(body["category_id"], food["id"]);
    assert_eq!(body["date"], "2024-03-15");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "category_id": null, "date": "2024-04-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category_id"], Value::Null);
    assert_eq!(body["date"], "2024-04-01");

    let (_, fetched) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(fetched, body);
}

#[tokio::test]
async fn test_expense_update_skips_create_rules() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let expense = create_expense(&app, &token, Value::Null).await;
    let uri = format!("/api/v1/expenses/{}", expense["id"]);

    // Blank title would fail `required` on create
    let (status, body) = send(&app, "PUT", &uri, Some(&token), Some(json!({ "title": "" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "");

    // Only the store's constraints apply
    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "category_id": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "amount": "not a number" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expense_delete() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let expense = create_expense(&app, &token, Value::Null).await;
    let uri = format!("/api/v1/expenses/{}", expense["id"]);

    let (status, body) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Expense deleted successfully");

    let (status, body) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Expense not found");
}

#[tokio::test]
async fn test_deleting_category_keeps_expenses() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let food = create_category(&app, &token, "Food").await;
    let expense = create_expense(&app, &token, food["id"].clone()).await;

    let uri = format!("/api/v1/categories/{}", food["id"]);
    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/expenses/{}", expense["id"]);
    let (status, body) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category_id"], Value::Null);
}

// =============================================================================
// Request Handling Tests
// =============================================================================

#[tokio::test]
async fn test_non_numeric_id_returns_404() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    for uri in [
        "/api/v1/budgets/abc",
        "/api/v1/categories/abc",
        "/api/v1/expenses/abc",
    ] {
        let (status, _) = send(&app, "GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }

    let (status, _) = send(&app, "DELETE", "/api/v1/expenses/1.5", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_returns_400() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/budgets")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_to_json(response.into_body()).await;
    assert!(body["message"].as_str().is_some());
}

// =============================================================================
// Rate Limiting Tests
// =============================================================================

#[tokio::test]
async fn test_budget_rate_limit() {
    let app = create_test_app();
    let token = register_and_login(&app, "jane@example.com").await;

    for i in 0..30 {
        let response = app
            .clone()
            .oneshot(make_request("GET", "/api/v1/budgets", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "Request {} should succeed", i);
        assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    }

    let (status, body) = send(&app, "GET", "/api/v1/budgets", Some(&token), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({ "message": "Too many requests. Please try again later." }));

    // Other groups have their own quota
    let (status, _) = send(&app, "GET", "/api/v1/expenses", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // And other users have their own counter
    let other = register_and_login(&app, "other@example.com").await;
    let (status, _) = send(&app, "GET", "/api/v1/budgets", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
}
