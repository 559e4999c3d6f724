use crate::core::config::JwtAuthConfig;
use crate::core::jwt_auth::{decode_jwt_token, generate_jwt_token, JwtClaims, TokenType};
use crate::core::AppError;
use crate::core::AppSuccessResponse;
use crate::db::users;
use crate::models::pagination::{PaginationQuery, SearchQuery};
use crate::models::users::{
    AccessToken, RefreshTokenRequest, RegisterRequest, TokenPair, TokenRequest,
    UpdateProfileRequest, UserProfile,
};
use crate::services::SubscriptionService;
use actix_web::{get, post, put, web, HttpResponse, Result};
use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use validator::Validate;

#[tracing::instrument(name = "Register User", skip(pool, request), fields(username = %request.username))]
#[post("")]
pub async fn register(
    pool: web::Data<PgPool>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    if users::username_exists(&pool, &request.username).await? {
        return Err(AppError::conflict("A user with that username already exists."));
    }
    if users::email_exists(&pool, &request.email, None).await? {
        return Err(AppError::conflict("A user with this email address already exists"));
    }

    let user = users::create_user(&pool, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        UserProfile::from(user),
        "User registered successfully",
    )))
}

#[tracing::instrument(name = "Get Profile", skip(pool, service, claims))]
#[get("/me")]
pub async fn get_profile(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = users::get_user_by_id(&pool, user_id).await?;
    let level = service.subscription_level(user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        UserProfile::new(user, level),
        "Profile retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Profile", skip(pool, service, claims, request))]
#[put("/me")]
pub async fn update_profile(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let user_id = claims.user_id()?;

    if let Some(email) = &request.email {
        if users::email_exists(&pool, email, Some(user_id)).await? {
            return Err(AppError::conflict("A user with this email address already exists"));
        }
    }

    let user = users::update_user_profile(&pool, user_id, &request).await?;
    let level = service.subscription_level(user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        UserProfile::new(user, level),
        "Profile updated successfully",
    )))
}

#[tracing::instrument(name = "List Users", skip(pool, claims))]
#[get("")]
pub async fn list_users(
    pool: web::Data<PgPool>,
    claims: JwtClaims,
    search: web::Query<SearchQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let pagination = pagination.into_inner().validated();

    let (users, total) = users::list_users(&pool, search.search.as_deref(), &pagination).await?;
    let profiles: Vec<UserProfile> = users.into_iter().map(UserProfile::from).collect();

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        profiles,
        "Users retrieved successfully",
        pagination.meta(total),
    )))
}

#[tracing::instrument(name = "Get User", skip(pool, service, claims))]
#[get("/{user_id}")]
pub async fn get_user(
    pool: web::Data<PgPool>,
    service: web::Data<SubscriptionService>,
    claims: JwtClaims,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;
    let user_id = user_id.into_inner();

    let user = users::get_user_by_id(&pool, user_id).await?;
    let level = service.subscription_level(user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        UserProfile::new(user, level),
        "User retrieved successfully",
    )))
}

fn expiry(exp: usize) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(exp as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[tracing::instrument(name = "Obtain Token", skip(pool, jwt_config, request), fields(username = %request.username))]
#[post("")]
pub async fn obtain_token(
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtAuthConfig>,
    request: web::Json<TokenRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    let invalid = || AppError::unauthorized("No active account found with the given credentials");

    let user = users::get_user_by_username(&pool, &request.username)
        .await?
        .ok_or_else(invalid)?;

    if !users::verify_password(&request.password, &user.password_hash)? {
        tracing::info!("password mismatch");
        return Err(invalid());
    }

    let access_claims = JwtClaims::for_user(&user, TokenType::Access, &jwt_config);
    let refresh_claims = JwtClaims::for_user(&user, TokenType::Refresh, &jwt_config);

    let tokens = TokenPair {
        access: generate_jwt_token(&access_claims, &jwt_config)?,
        refresh: generate_jwt_token(&refresh_claims, &jwt_config)?,
        expires_at: expiry(access_claims.exp),
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(tokens, "Login successful")))
}

#[tracing::instrument(name = "Refresh Token", skip(pool, jwt_config, request))]
#[post("/refresh")]
pub async fn refresh_token(
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtAuthConfig>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, AppError> {
    let refresh_claims = decode_jwt_token(&request.refresh, TokenType::Refresh, &jwt_config)?;

    // The account may have been deactivated since the refresh token was issued.
    let user = users::get_user_by_id(&pool, refresh_claims.user_id()?)
        .await
        .map_err(|_| AppError::unauthorized("User not found"))?;

    let access_claims = JwtClaims::for_user(&user, TokenType::Access, &jwt_config);
    let token = AccessToken {
        access: generate_jwt_token(&access_claims, &jwt_config)?,
        expires_at: expiry(access_claims.exp),
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(token, "Token refreshed")))
}
