use reqwest::StatusCode;
use serde_json::Value;

use crate::helpers::spawn_app;

#[tokio::test]
async fn callback_without_authority_is_a_bad_request() {
    let app = spawn_app().await;

    for query in ["", "?Status=OK", "?Authority=%20%20&Status=OK"] {
        let response = app
            .api_client
            .get(app.url(&format!("/payment/callback{}", query)))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Invalid return parameters from the gateway.");
    }
}
