use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::web::{scope, JsonConfig, PathConfig, QueryConfig, ServiceConfig};
use actix_web::{HttpRequest, Scope};

use bookmarks::{create_bookmark, delete_bookmark, list_bookmarks};
use categories::{create_category, list_categories};
use comments::{delete_comment, get_comment, list_comments};
use health_check::*;
use history::{list_history, record_history};
use payments::{list_payments, payment_callback};
use plans::{get_plan, list_plans};
use series::{create_series, delete_series, get_series, list_series, update_series};
use subscriptions::{
    cancel_subscription, create_subscription, expire_subscriptions, get_active_subscription,
    get_subscription, list_subscriptions, renew_subscription, upgrade_subscription,
};
use users::{
    get_profile, get_user, list_users, obtain_token, refresh_token, register, update_profile,
};
use videos::{
    comment_on_video, create_video, delete_video, get_video, list_videos, live_status,
    review_video, toggle_bookmark, update_video, watch_video,
};

use crate::core::AppError;

mod bookmarks;
mod categories;
mod comments;
mod health_check;
mod history;
mod payments;
mod plans;
mod series;
mod subscriptions;
mod users;
mod videos;

fn users_routes() -> Scope {
    // `/me` must be registered ahead of `/{user_id}`.
    scope("users")
        .service(register)
        .service(list_users)
        .service(get_profile)
        .service(update_profile)
        .service(get_user)
}

fn token_routes() -> Scope {
    scope("token").service(obtain_token).service(refresh_token)
}

fn catalog_routes() -> Vec<Scope> {
    vec![
        scope("plans").service(list_plans).service(get_plan),
        scope("categories")
            .service(list_categories)
            .service(create_category),
        scope("series")
            .service(list_series)
            .service(create_series)
            .service(get_series)
            .service(update_series)
            .service(delete_series),
    ]
}

fn videos_routes() -> Scope {
    scope("videos")
        .service(list_videos)
        .service(create_video)
        .service(get_video)
        .service(update_video)
        .service(delete_video)
        // interactions
        .service(watch_video)
        .service(live_status)
        .service(comment_on_video)
        .service(review_video)
        .service(toggle_bookmark)
}

fn subscriptions_routes() -> Scope {
    scope("subscriptions")
        .service(list_subscriptions)
        .service(create_subscription)
        .service(get_active_subscription)
        .service(get_subscription)
        .service(upgrade_subscription)
        .service(renew_subscription)
        .service(cancel_subscription)
}

fn interactions_routes() -> Vec<Scope> {
    vec![
        scope("history").service(list_history).service(record_history),
        scope("comments")
            .service(list_comments)
            .service(get_comment)
            .service(delete_comment),
        scope("bookmarks")
            .service(list_bookmarks)
            .service(create_bookmark)
            .service(delete_bookmark),
    ]
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::json_parse_error(format!("JSON parse error - {}", err)).into()
}

fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::bad_request(format!("Invalid query parameters - {}", err)).into()
}

fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::not_found(format!("Invalid path - {}", err)).into()
}

pub fn streaming_routes(conf: &mut ServiceConfig) {
    conf.app_data(JsonConfig::default().error_handler(json_error_handler))
        .app_data(QueryConfig::default().error_handler(query_error_handler))
        .app_data(PathConfig::default().error_handler(path_error_handler))
        .service(health_check)
        .service(scope("payment").service(payment_callback))
        .service(
            scope("api")
                .service(users_routes())
                .service(token_routes())
                .service(catalog_routes())
                .service(videos_routes())
                .service(subscriptions_routes())
                .service(scope("payments").service(list_payments))
                .service(scope("admin").service(expire_subscriptions))
                .service(interactions_routes()),
        );
}
