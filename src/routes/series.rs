use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::catalog;
use crate::models::catalog::{SeriesDetail, SeriesPayload};
use crate::models::pagination::{PaginationQuery, SearchQuery};
use actix_web::{delete, get, post, put, web, HttpResponse, Result};
use sqlx::PgPool;
use validator::Validate;

#[tracing::instrument(name = "Get Series", skip(pool))]
#[get("")]
pub async fn list_series(
    pool: web::Data<PgPool>,
    search: web::Query<SearchQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let pagination = pagination.into_inner().validated();
    let (series, total) =
        catalog::get_series_list(&pool, search.search.as_deref(), &pagination).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        series,
        "Series retrieved successfully",
        pagination.meta(total),
    )))
}

#[tracing::instrument(name = "Get Series Detail", skip(pool, claims))]
#[get("/{slug}")]
pub async fn get_series(
    pool: web::Data<PgPool>,
    claims: Option<JwtClaims>,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let is_admin = claims.as_ref().map(JwtClaims::is_admin).unwrap_or(false);

    let series = catalog::get_series_by_slug(pool.get_ref(), &slug).await?;
    let episodes = catalog::get_series_episodes(pool.get_ref(), series.id, is_admin).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        SeriesDetail { series, episodes },
        "Series retrieved successfully",
    )))
}

#[tracing::instrument(name = "Create Series", skip(pool, claims, request))]
#[post("")]
pub async fn create_series(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    request: web::Json<SeriesPayload>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    request.validate()?;

    let series = catalog::create_series(&pool, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        series,
        "Series created successfully",
    )))
}

#[tracing::instrument(name = "Update Series", skip(pool, claims, request))]
#[put("/{slug}")]
pub async fn update_series(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    slug: web::Path<String>,
    request: web::Json<SeriesPayload>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    request.validate()?;

    let current = catalog::get_series_by_slug(pool.get_ref(), &slug).await?;
    let series = catalog::update_series(&pool, current.id, &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        series,
        "Series updated successfully",
    )))
}

/// Deleting a series removes its episodes too.
#[tracing::instrument(name = "Delete Series", skip(pool, claims))]
#[delete("/{slug}")]
pub async fn delete_series(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let series = catalog::get_series_by_slug(pool.get_ref(), &slug).await?;
    catalog::delete_series(pool.get_ref(), series.id).await?;

    Ok(HttpResponse::NoContent().finish())
}
