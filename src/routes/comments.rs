use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::interactions;
use crate::models::pagination::PaginationQuery;
use actix_web::{delete, get, web, HttpResponse, Result};
use sqlx::PgPool;

#[tracing::instrument(name = "Get My Comments", skip(pool, claims))]
#[get("")]
pub async fn list_comments(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let pagination = pagination.into_inner().validated();

    let comments = interactions::get_user_comments(pool.get_ref(), user_id, &pagination).await?;
    let total = interactions::count_user_comments(pool.get_ref(), user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        comments,
        "Comments retrieved successfully",
        pagination.meta(total),
    )))
}

#[tracing::instrument(name = "Get Comment", skip(pool, claims))]
#[get("/{comment_id}")]
pub async fn get_comment(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    comment_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let comment =
        interactions::get_user_comment(pool.get_ref(), claims.user_id()?, comment_id.into_inner())
            .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        comment,
        "Comment retrieved successfully",
    )))
}

#[tracing::instrument(name = "Delete Comment", skip(pool, claims))]
#[delete("/{comment_id}")]
pub async fn delete_comment(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    comment_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    interactions::delete_user_comment(pool.get_ref(), claims.user_id()?, comment_id.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
