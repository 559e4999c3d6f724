use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::users;
use crate::models::subscriptions::{Checkout, CreateSubscriptionRequest, UpgradeSubscriptionRequest};
use crate::services::SubscriptionService;
use actix_web::{get, post, web, HttpResponse, Result};
use sqlx::PgPool;

fn checkout_response(checkout: Checkout, message: &str) -> HttpResponse {
    let message = if checkout.payment_url.is_some() {
        format!("{}. Complete the payment to continue.", message)
    } else {
        format!("{}. No payment was required.", message)
    };
    HttpResponse::Created().json(AppSuccessResponse::new(checkout, message))
}

#[tracing::instrument(name = "Get User Subscriptions", skip(service, claims))]
#[get("")]
pub async fn list_subscriptions(
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
) -> Result<HttpResponse, AppError> {
    let subscriptions = service.user_subscriptions(claims.user_id()?).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        subscriptions,
        "User subscriptions retrieved successfully",
    )))
}

#[tracing::instrument(name = "Create Subscription", skip(pool, service, claims, request))]
#[post("")]
pub async fn create_subscription(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    request: web::Json<CreateSubscriptionRequest>,
) -> Result<HttpResponse, AppError> {
    let user = users::get_user_by_id(&pool, claims.user_id()?).await?;
    let checkout = service.purchase(&user, request.plan_id).await?;

    Ok(checkout_response(checkout, "Subscription created"))
}

#[tracing::instrument(name = "Get Active Subscription", skip(service, claims))]
#[get("/active")]
pub async fn get_active_subscription(
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
) -> Result<HttpResponse, AppError> {
    let overview = service.overview(claims.user_id()?).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        overview,
        "Active subscription retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Subscription", skip(service, claims))]
#[get("/{subscription_id}")]
pub async fn get_subscription(
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    subscription_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let detail = service
        .user_subscription(claims.user_id()?, subscription_id.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        detail,
        "Subscription retrieved successfully",
    )))
}

#[tracing::instrument(name = "Upgrade Subscription", skip(pool, service, claims, request))]
#[post("/{subscription_id}/upgrade")]
pub async fn upgrade_subscription(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    subscription_id: web::Path<i64>,
    request: web::Json<UpgradeSubscriptionRequest>,
) -> Result<HttpResponse, AppError> {
    let user = users::get_user_by_id(&pool, claims.user_id()?).await?;
    let checkout = service
        .upgrade(&user, subscription_id.into_inner(), request.plan_id)
        .await?;

    Ok(checkout_response(checkout, "Upgrade requested"))
}

#[tracing::instrument(name = "Renew Subscription", skip(pool, service, claims))]
#[post("/{subscription_id}/renew")]
pub async fn renew_subscription(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    subscription_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = users::get_user_by_id(&pool, claims.user_id()?).await?;
    let checkout = service.renew(&user, subscription_id.into_inner()).await?;

    Ok(checkout_response(checkout, "Renewal requested"))
}

#[tracing::instrument(name = "Cancel Subscription", skip(service, claims))]
#[post("/{subscription_id}/cancel")]
pub async fn cancel_subscription(
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    subscription_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let subscription = service
        .cancel(claims.user_id()?, subscription_id.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        subscription,
        "Subscription cancelled",
    )))
}

#[tracing::instrument(name = "Expire Subscriptions", skip(service, claims))]
#[post("/subscriptions/expire")]
pub async fn expire_subscriptions(
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let expired = service.expire_lapsed().await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        serde_json::json!({ "expired": expired }),
        "Lapsed subscriptions expired",
    )))
}
