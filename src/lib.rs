pub mod core;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod streaming_web_server;
