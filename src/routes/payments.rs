use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::payments;
use crate::models::pagination::PaginationQuery;
use crate::models::payments::{PaymentCallbackQuery, PaymentStatus};
use crate::services::SubscriptionService;
use actix_web::{get, web, HttpResponse, Result};
use sqlx::PgPool;

#[tracing::instrument(name = "Get Payments", skip(pool, claims))]
#[get("")]
pub async fn list_payments(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let pagination = pagination.into_inner().validated();

    let items = payments::get_user_payments(pool.get_ref(), user_id, &pagination).await?;
    let total = payments::count_user_payments(pool.get_ref(), user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        items,
        "Payments retrieved successfully",
        pagination.meta(total),
    )))
}

/// Where the provider sends the user back after the payment page.
#[tracing::instrument(name = "Payment Callback", skip(service, query), fields(authority))]
#[get("/callback")]
pub async fn payment_callback(
    service: web::Data<SubscriptionService>,
    query: web::Query<PaymentCallbackQuery>,
) -> Result<HttpResponse, AppError> {
    let authority = query
        .authority
        .as_deref()
        .map(str::trim)
        .filter(|authority| !authority.is_empty())
        .ok_or_else(|| AppError::bad_request("Invalid return parameters from the gateway."))?;
    tracing::Span::current().record("authority", authority);

    let status = query.status.as_deref().unwrap_or_default();
    let outcome = service.handle_callback(authority, status).await?;

    let message = match outcome.payment.status {
        PaymentStatus::Success => "Payment completed successfully",
        PaymentStatus::Failed => "Payment failed",
        PaymentStatus::Pending => "Payment is still pending",
        PaymentStatus::Refunded => "Payment was refunded",
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(outcome, message)))
}
