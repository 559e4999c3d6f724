use std::net::TcpListener;

use once_cell::sync::Lazy;
use secrecy::Secret;
use streaming_platform::core::config::{GatewayProvider, JwtAuthConfig};
use streaming_platform::core::jwt_auth::{generate_jwt_token, JwtClaims, TokenType};
use streaming_platform::core::{get_subscriber, init_subscriber, AppConfig};
use streaming_platform::models::users::Role;
use streaming_platform::streaming_web_server::{get_connection_pool, run};

// Set `TEST_LOG=1` to see the bunyan output of the server under test.
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub jwt_config: JwtAuthConfig,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub fn token_for(&self, user_id: i64, role: Role, token_type: TokenType) -> String {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = JwtClaims {
            sub: user_id.to_string(),
            username: format!("user{}", user_id),
            role,
            token_type,
            iat: now,
            exp: now + 600,
        };
        generate_jwt_token(&claims, &self.jwt_config).expect("Failed to sign test token")
    }

    pub fn access_token(&self, role: Role) -> String {
        self.token_for(7, role, TokenType::Access)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Starts the server on a random port. Postgres and Redis are never contacted
/// by the requests these tests make, since the pool connects lazily.
pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let mut configuration = AppConfig::new().expect("Failed to read configuration");
    configuration.streaming_server_config.port = 0;
    configuration.payment_gateway.provider = GatewayProvider::Mock;
    configuration.jwt_auth_config.secret = Secret::new("integration-test-secret".to_string());

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let pg_pool = get_connection_pool(&configuration);
    let redis_client = configuration
        .redis
        .connect()
        .expect("Failed to build the redis client");
    let jwt_config = configuration.jwt_auth_config.clone();

    let server = run(listener, pg_pool, redis_client, configuration)
        .expect("Failed to build the server");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        jwt_config,
        api_client: reqwest::Client::new(),
    }
}
