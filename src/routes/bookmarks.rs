use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{catalog, interactions};
use crate::models::catalog::VideoStatus;
use crate::models::interactions::CreateBookmarkRequest;
use crate::models::pagination::PaginationQuery;
use actix_web::{delete, get, post, web, HttpResponse, Result};
use sqlx::PgPool;

#[tracing::instrument(name = "Get Bookmarks", skip(pool, claims))]
#[get("")]
pub async fn list_bookmarks(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let pagination = pagination.into_inner().validated();

    let bookmarks = interactions::get_user_bookmarks(pool.get_ref(), user_id, &pagination).await?;
    let total = interactions::count_user_bookmarks(pool.get_ref(), user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        bookmarks,
        "Bookmarks retrieved successfully",
        pagination.meta(total),
    )))
}

#[tracing::instrument(name = "Create Bookmark", skip(pool, claims))]
#[post("")]
pub async fn create_bookmark(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    request: web::Json<CreateBookmarkRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let video = catalog::get_video_by_id(pool.get_ref(), request.video_id).await?;
    if video.status != VideoStatus::Published {
        return Err(AppError::not_found("Video not found"));
    }

    let bookmark = interactions::insert_bookmark(pool.get_ref(), user_id, video.id).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(bookmark, "Bookmark added")))
}

#[tracing::instrument(name = "Delete Bookmark", skip(pool, claims))]
#[delete("/{bookmark_id}")]
pub async fn delete_bookmark(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    bookmark_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    interactions::delete_user_bookmark(pool.get_ref(), claims.user_id()?, bookmark_id.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
