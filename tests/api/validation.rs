use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::helpers::spawn_app;

#[tokio::test]
async fn register_rejects_malformed_json() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .post(app.url("/api/users"))
        .header("Content-Type", "application/json")
        .body("{\"username\": ")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn register_reports_invalid_fields() {
    let app = spawn_app().await;
    let test_cases = vec![
        (
            json!({"username": "viewer", "email": "not-an-email", "password": "long enough"}),
            "email",
        ),
        (
            json!({"username": "viewer", "email": "viewer@example.com", "password": "short"}),
            "password",
        ),
        (
            json!({"username": "has space", "email": "viewer@example.com", "password": "long enough"}),
            "username",
        ),
    ];

    for (payload, field) in test_cases {
        let response = app
            .api_client
            .post(app.url("/api/users"))
            .json(&payload)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "invalid {} was accepted",
            field
        );
        let body: Value = response.json().await.unwrap();
        assert!(body["errors"].get(field).is_some(), "no error for {}", field);
    }
}

#[tokio::test]
async fn token_requires_both_credentials() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .post(app.url("/api/token"))
        .json(&json!({"username": "", "password": ""}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(app.url("/api/comments/abc"))
        .bearer_auth(app.access_token(streaming_platform::models::users::Role::User))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
