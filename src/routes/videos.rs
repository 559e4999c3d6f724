use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{catalog, interactions};
use crate::models::catalog::{
    Video, VideoDetail, VideoListQuery, VideoLiveStatus, VideoPayload, VideoStatus,
};
use crate::models::interactions::{
    BookmarkToggle, CreateCommentRequest, RecordWatchRequest, ReviewRequest, ReviewResponse,
};
use crate::models::pagination::PaginationQuery;
use crate::services::SubscriptionService;
use actix_web::{delete, get, post, put, web, HttpResponse, Result};
use sqlx::PgPool;
use validator::Validate;

const RECENT_COMMENTS: i64 = 10;

/// Loads a video the caller is allowed to see. Unpublished videos only exist for admins.
async fn visible_video(pool: &PgPool, slug: &str, claims: Option<&JwtClaims>) -> Result<Video, AppError> {
    let video = catalog::get_video_by_slug(pool, slug).await?;
    let is_admin = claims.map(JwtClaims::is_admin).unwrap_or(false);

    if video.status != VideoStatus::Published && !is_admin {
        return Err(AppError::not_found("Video not found"));
    }
    Ok(video)
}

fn ensure_access(video: &Video, level: i32) -> Result<(), AppError> {
    if video.can_user_access(Some(level)) {
        Ok(())
    } else {
        Err(AppError::forbidden_error(
            "Your subscription does not include this video",
        ))
    }
}

async fn video_detail(pool: &PgPool, video: Video, level: Option<i32>) -> Result<VideoDetail, AppError> {
    let category = match video.category_id {
        Some(id) => catalog::get_category_by_id(pool, id).await?,
        None => None,
    };
    let series_title = match video.series_id {
        Some(id) => catalog::get_series_title(pool, id).await?,
        None => None,
    };
    let (views_count, average_rating) = catalog::get_video_stats(pool, video.id).await?;

    Ok(VideoDetail {
        display_title: video.display_title(series_title.as_deref()),
        can_watch: video.can_user_access(level),
        category,
        series_title,
        average_rating,
        views_count,
        video,
    })
}

#[tracing::instrument(name = "Get Videos", skip(pool, claims, query))]
#[get("")]
pub async fn list_videos(
    pool: web::Data<PgPool>,
    claims: Option<JwtClaims>,
    query: web::Query<VideoListQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let is_admin = claims.as_ref().map(JwtClaims::is_admin).unwrap_or(false);
    let pagination = pagination.into_inner().validated();

    let (videos, total) = catalog::get_videos(&pool, &query, is_admin, &pagination).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        videos,
        "Videos retrieved successfully",
        pagination.meta(total),
    )))
}

#[tracing::instrument(name = "Get Video", skip(pool, service, claims))]
#[get("/{slug}")]
pub async fn get_video(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: Option<JwtClaims>,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let video = visible_video(&pool, &slug, claims.as_ref()).await?;

    let level = match &claims {
        Some(claims) => Some(service.subscription_level(claims.user_id()?).await?),
        None => None,
    };
    let detail = video_detail(&pool, video, level).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        detail,
        "Video retrieved successfully",
    )))
}

#[tracing::instrument(name = "Create Video", skip(pool, claims, request))]
#[post("")]
pub async fn create_video(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    request: web::Json<VideoPayload>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    request.validate()?;

    let video = catalog::create_video(&pool, &request, claims.user_id()?).await?;
    tracing::info!(video_id = video.id, slug = %video.slug, "video created");

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        video,
        "Video created successfully",
    )))
}

#[tracing::instrument(name = "Update Video", skip(pool, claims, request))]
#[put("/{slug}")]
pub async fn update_video(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    slug: web::Path<String>,
    request: web::Json<VideoPayload>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    request.validate()?;

    let current = catalog::get_video_by_slug(pool.get_ref(), &slug).await?;
    let video = catalog::update_video(&pool, &current, &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        video,
        "Video updated successfully",
    )))
}

#[tracing::instrument(name = "Delete Video", skip(pool, claims))]
#[delete("/{slug}")]
pub async fn delete_video(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let video = catalog::get_video_by_slug(pool.get_ref(), &slug).await?;
    catalog::delete_video(pool.get_ref(), video.id).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[tracing::instrument(name = "Watch Video", skip(pool, service, claims, request))]
#[post("/{slug}/watch")]
pub async fn watch_video(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    slug: web::Path<String>,
    request: web::Json<RecordWatchRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let user_id = claims.user_id()?;

    let level = service.subscription_level(user_id).await?;
    if level == 0 {
        return Err(AppError::forbidden_error(
            "An active subscription is required to watch videos",
        ));
    }

    let video = visible_video(&pool, &slug, None).await?;
    ensure_access(&video, level)?;

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

#[tracing::instrument(name = "Video Live Status", skip(pool, claims))]
#[get("/{slug}/live-status")]
pub async fn live_status(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let video = visible_video(&pool, &slug, Some(&claims)).await?;

    let (views, average_rating) = catalog::get_video_stats(pool.get_ref(), video.id).await?;
    let recent_comments =
        catalog::get_recent_comments(pool.get_ref(), video.id, RECENT_COMMENTS).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        VideoLiveStatus {
            video_id: video.id,
            views,
            average_rating,
            recent_comments,
        },
        "Live status retrieved successfully",
    )))
}

#[tracing::instrument(name = "Comment On Video", skip(pool, service, claims, request))]
#[post("/{slug}/comment")]
pub async fn comment_on_video(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    slug: web::Path<String>,
    request: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let user_id = claims.user_id()?;

    let video = visible_video(&pool, &slug, None).await?;
    ensure_access(&video, service.subscription_level(user_id).await?)?;

    let comment = interactions::insert_comment(
        pool.get_ref(),
        user_id,
        video.id,
        &request.comment,
        request.is_spoiler,
    )
    .await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(comment, "Comment added")))
}

#[tracing::instrument(name = "Review Video", skip(pool, service, claims, request))]
#[post("/{slug}/review")]
pub async fn review_video(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    slug: web::Path<String>,
    request: web::Json<ReviewRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let user_id = claims.user_id()?;

    let video = visible_video(&pool, &slug, None).await?;
    ensure_access(&video, service.subscription_level(user_id).await?)?;

    let mut tx = pool.begin().await?;

    let comment = interactions::insert_comment(
        &mut *tx,
        user_id,
        video.id,
        &request.comment,
        request.is_spoiler,
    )
    .await?;

    let watch_history = match request.rating {
        Some(rating) => {
            match interactions::rate_latest_watch(&mut *tx, user_id, video.id, rating).await? {
                Some(entry) => Some(entry),
                None => Some(
                    interactions::insert_watch_history(
                        &mut *tx,
                        user_id,
                        video.id,
                        0,
                        false,
                        Some(rating),
                        None,
                    )
                    .await?,
                ),
            }
        }
        None => None,
    };

    tx.commit().await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        ReviewResponse {
            comment,
            watch_history,
        },
        "Review added",
    )))
}

#[tracing::instrument(name = "Toggle Bookmark", skip(pool, claims))]
#[post("/{slug}/bookmark")]
pub async fn toggle_bookmark(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let video = visible_video(&pool, &slug, None).await?;

    let removed = interactions::remove_bookmark_for_video(pool.get_ref(), user_id, video.id).await?;
    if removed {
        return Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
            BookmarkToggle {
                video_id: video.id,
                bookmarked: false,
            },
            "Bookmark removed",
        )));
    }

    interactions::insert_bookmark(pool.get_ref(), user_id, video.id).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        BookmarkToggle {
            video_id: video.id,
            bookmarked: true,
        },
        "Bookmark added",
    )))
}
