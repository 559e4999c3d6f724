use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{catalog, interactions};
use crate::models::interactions::RecordWatchRequest;
use crate::models::pagination::PaginationQuery;
use crate::services::SubscriptionService;
use actix_web::{get, post, web, HttpResponse, Result};
use sqlx::PgPool;
use validator::Validate;

#[tracing::instrument(name = "Get Watch History", skip(pool, claims))]
#[get("")]
pub async fn list_history(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let pagination = pagination.into_inner().validated();

    let entries = interactions::get_user_watch_history(pool.get_ref(), user_id, &pagination).await?;
    let total = interactions::count_user_watch_history(pool.get_ref(), user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        entries,
        "Watch history retrieved successfully",
        pagination.meta(total),
    )))
}

#[tracing::instrument(name = "Record Watch History", skip(pool, service, claims, request))]
#[post("")]
pub async fn record_history(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    request: web::Json<RecordWatchRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let user_id = claims.user_id()?;

    let video_id = request
        .video_id
        .ok_or_else(|| AppError::bad_request("video_id is required"))?;
    let video = catalog::get_video_by_id(pool.get_ref(), video_id)
        .await
        .map_err(|_| AppError::bad_request("Invalid video_id"))?;

    let level = service.subscription_level(user_id).await?;
    if !video.can_user_access(Some(level)) {
        return Err(AppError::forbidden_error(
            "Your subscription does not include this video",
        ));
    }

    let entry = interactions::insert_watch_history(
        pool.get_ref(),
        user_id,
        video.id,
        request.progress_seconds,
        request.completed,
        request.rating,
        request.review.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(entry, "Watch recorded")))
}
