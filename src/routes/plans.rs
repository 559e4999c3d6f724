use crate::core::redis_helper::PLANS_CACHE_KEY;
use crate::core::{AppError, AppSuccessResponse, RedisHelper};
use crate::db::subscriptions;
use crate::models::subscriptions::SubscriptionPlan;
use actix_web::{get, web, HttpResponse, Result};
use sqlx::PgPool;

#[tracing::instrument(name = "Get Subscription Plans", skip(pool, cache))]
#[get("")]
pub async fn list_plans(
    pool: web::Data<PgPool>,
    cache: web::Data<RedisHelper>,
) -> Result<HttpResponse, AppError> {
    let pool = pool.get_ref();
    let plans: Vec<SubscriptionPlan> = cache
        .get_or_load(PLANS_CACHE_KEY, || subscriptions::get_active_plans(pool))
        .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        plans,
        "Subscription plans retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Subscription Plan", skip(pool))]
#[get("/{slug}")]
pub async fn get_plan(
    pool: web::Data<PgPool>,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let plan = subscriptions::get_active_plan_by_slug(pool.get_ref(), &slug).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        plan,
        "Subscription plan retrieved successfully",
    )))
}
