use crate::core::config::JwtAuthConfig;
use crate::core::{AppConfig, RedisHelper};
use crate::routes::streaming_routes;
use crate::services::{build_gateway, SubscriptionService};
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{dev::Server, web::Data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

pub struct StreamingWebServer {
    port: u16,
    server: Server,
}

impl StreamingWebServer {
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.streaming_server_config.host,
            configuration.streaming_server_config.port
        );

        let pg_pool = get_connection_pool(&configuration);
        let redis_client = configuration.redis.connect()?;

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, pg_pool, redis_client, configuration)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Connections are opened on first use, so the server starts even when Postgres is still coming up.
pub fn get_connection_pool(configuration: &AppConfig) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy_with(configuration.postgres.connect())
}

pub fn run(
    listener: TcpListener,
    pg_pool: PgPool,
    redis_client: redis::Client,
    configuration: AppConfig,
) -> Result<Server, anyhow::Error> {
    let gateway = build_gateway(&configuration.payment_gateway)?;
    let subscription_service = Data::new(SubscriptionService::new(
        pg_pool.clone(),
        gateway,
        configuration.payment_gateway.callback_url.clone(),
    ));

    let redis_helper = Data::new(RedisHelper::new(
        redis_client,
        Duration::from_secs(configuration.redis.cache_ttl_seconds),
    ));
    let jwt_config: Data<JwtAuthConfig> = Data::new(configuration.jwt_auth_config);
    let pg_pool = Data::new(pg_pool);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .supports_credentials();
        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .configure(streaming_routes)
            .app_data(pg_pool.clone())
            .app_data(redis_helper.clone())
            .app_data(jwt_config.clone())
            .app_data(subscription_service.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
