pub mod config;
mod responses;
pub mod jwt_auth;
mod telemetry;
pub mod redis_helper;
pub mod utils;

pub use self::config::AppConfig;
pub use responses::*;
pub use telemetry::*;
pub use redis_helper::RedisHelper;
