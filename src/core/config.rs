use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub streaming_server_config: StreamingServerConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub jwt_auth_config: JwtAuthConfig,
    pub payment_gateway: PaymentGatewayConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let base_path = std::env::current_dir()
            .map_err(|e| config::ConfigError::Message(format!("Failed to find the current dir: {}", e)))?;
        let config_dir = base_path.join("src/core/configurations");

        let app_environment: Environment = std::env::var("STREAMING_APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .map_err(config::ConfigError::Message)?;

        let configurations = config::Config::builder()
            .add_source(
                config::File::from(config_dir.join(app_environment.as_str())).required(true),
            )
            // e.g. `STREAMING__JWT_AUTH_CONFIG__SECRET=...`
            .add_source(
                config::Environment::with_prefix("STREAMING")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        configurations.try_deserialize()
    }
}

#[derive(Deserialize, Clone)]
pub struct StreamingServerConfig {
    pub port: u16,
    pub host: String,
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
}

fn default_log_directory() -> String {
    "/var/tmp/log/streaming_platform".to_string()
}

#[derive(Deserialize, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: String,
    pub password: Option<Secret<String>>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

fn default_cache_ttl() -> u64 {
    600
}

impl RedisConfig {
    pub fn connect(&self) -> Result<redis::Client, redis::RedisError> {
        let url = match &self.password {
            Some(password) => format!(
                "redis://:{password}@{host}:{port}",
                password = password.expose_secret(),
                host = self.host,
                port = self.port
            ),
            None => format!("redis://{host}:{port}", host = self.host, port = self.port),
        };
        redis::Client::open(url)
    }
}

#[derive(Deserialize, Clone)]
pub struct PostgresConfig {
    pub username: String,
    pub password: Secret<String>,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl PostgresConfig {
    pub fn connect(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        let options = PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name);

        options.log_statements(tracing::log::LevelFilter::Trace)
    }
}

#[derive(Deserialize, Clone)]
pub struct JwtAuthConfig {
    pub secret: Secret<String>,
    /// Lifetime of access tokens, in minutes.
    pub token_expiration_time: i64,
    /// Lifetime of refresh tokens, in days.
    pub refresh_token_expiration_days: i64,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayProvider {
    Zarinpal,
    Mock,
}

#[derive(Deserialize, Clone)]
pub struct PaymentGatewayConfig {
    pub provider: GatewayProvider,
    pub merchant_id: Secret<String>,
    /// Base of the provider API, e.g. `https://sandbox.zarinpal.com`.
    pub base_url: String,
    /// Absolute URL of `/payment/callback` as reachable by the provider.
    pub callback_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_success_rate")]
    pub mock_success_rate: f64,
}

fn default_currency() -> String {
    "IRR".to_string()
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_success_rate() -> f64 {
    1.0
}

#[derive(Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. Use either `local` or `production`",
                other
            )),
        }
    }
}
