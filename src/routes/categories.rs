use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::catalog;
use crate::models::catalog::CreateCategoryRequest;
use actix_web::{get, post, web, HttpResponse, Result};
use sqlx::PgPool;
use validator::Validate;

#[tracing::instrument(name = "Get Categories", skip(pool))]
#[get("")]
pub async fn list_categories(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let categories = catalog::get_categories(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        categories,
        "Categories retrieved successfully",
    )))
}

#[tracing::instrument(name = "Create Category", skip(pool, claims, request))]
#[post("")]
pub async fn create_category(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    request: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    request.validate()?;

    let category =
        catalog::create_category(&pool, &request.name, request.description.as_deref()).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        category,
        "Category created successfully",
    )))
}
