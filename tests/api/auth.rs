use reqwest::StatusCode;
use serde_json::Value;
use streaming_platform::core::jwt_auth::TokenType;
use streaming_platform::models::users::Role;

use crate::helpers::spawn_app;

#[tokio::test]
async fn protected_routes_reject_anonymous_requests() {
    let app = spawn_app().await;
    let protected = [
        ("GET", "/api/users/me"),
        ("GET", "/api/subscriptions"),
        ("GET", "/api/subscriptions/active"),
        ("POST", "/api/subscriptions/1/cancel"),
        ("GET", "/api/payments"),
        ("GET", "/api/history"),
        ("GET", "/api/comments"),
        ("GET", "/api/bookmarks"),
    ];

    for (verb, path) in protected {
        let request = match verb {
            "GET" => app.api_client.get(app.url(path)),
            _ => app.api_client.post(app.url(path)),
        };
        let response = request.send().await.expect("Failed to execute request.");

        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require authentication",
            verb,
            path
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Authentication credentials were not provided");
    }
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_bearer() {
    let app = spawn_app().await;
    let refresh = app.token_for(7, Role::User, TokenType::Refresh);

    let response = app
        .api_client
        .get(app.url("/api/subscriptions"))
        .bearer_auth(refresh)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let app = spawn_app().await;
    let mut token = app.access_token(Role::User);
    token.push('x');

    let response = app
        .api_client
        .get(app.url("/api/users/me"))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn access_token_is_refused_by_the_refresh_endpoint() {
    let app = spawn_app().await;
    let access = app.access_token(Role::User);

    let response = app
        .api_client
        .post(app.url("/api/token/refresh"))
        .json(&serde_json::json!({ "refresh": access }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_are_forbidden_for_regular_users() {
    let app = spawn_app().await;
    let token = app.access_token(Role::User);

    let requests = [
        app.api_client.get(app.url("/api/users")),
        app.api_client.get(app.url("/api/users/3")),
        app.api_client
            .post(app.url("/api/categories"))
            .json(&serde_json::json!({ "name": "Drama" })),
        app.api_client.delete(app.url("/api/series/1")),
        app.api_client.delete(app.url("/api/videos/1")),
        app.api_client.post(app.url("/api/admin/subscriptions/expire")),
    ];

    for request in requests {
        let response = request
            .bearer_auth(&token)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Access denied. Admin role required.");
    }
}
