use crate::core::AppError;
use crate::models::pagination::PaginationQuery;
use crate::models::users::{RegisterRequest, UpdateProfileRequest, User};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, username, email, phone_number, first_name, last_name, \
     password_hash, role, is_active, created_at, updated_at";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::internal_error("Failed to hash password"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::internal_error("Invalid password hash"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn create_user(pool: &PgPool, request: &RegisterRequest) -> Result<User, AppError> {
    let password_hash = hash_password(&request.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, email, phone_number, first_name, last_name, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(request.username.trim())
    .bind(request.email.trim().to_lowercase())
    .bind(request.phone_number.as_deref().unwrap_or_default())
    .bind(request.first_name.as_deref().unwrap_or_default())
    .bind(request.last_name.as_deref().unwrap_or_default())
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn get_user_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND is_active = TRUE"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(user)
}

pub async fn get_user_by_id(pool: &PgPool, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn email_exists(
    pool: &PgPool,
    email: &str,
    excluding_user: Option<i64>,
) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM users
            WHERE LOWER(email) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2)
        )
        "#,
    )
    .bind(email.trim())
    .bind(excluding_user)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(exists)
}

pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
            .bind(username.trim())
            .fetch_one(pool)
            .await
            .map_err(AppError::db_error)?;

    Ok(exists)
}

pub async fn update_user_profile(
    pool: &PgPool,
    user_id: i64,
    request: &UpdateProfileRequest,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET email = COALESCE($2, email),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            phone_number = COALESCE($5, phone_number),
            updated_at = NOW()
        WHERE id = $1 AND is_active = TRUE
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(request.email.as_ref().map(|email| email.trim().to_lowercase()))
    .bind(request.first_name.as_deref())
    .bind(request.last_name.as_deref())
    .bind(request.phone_number.as_deref())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(user)
}

pub async fn list_users(
    pool: &PgPool,
    search: Option<&str>,
    pagination: &PaginationQuery,
) -> Result<(Vec<User>, i64), AppError> {
    let pattern = search
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| format!("%{}%", term));

    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS} FROM users
        WHERE $1::TEXT IS NULL OR username ILIKE $1 OR email ILIKE $1
        ORDER BY id
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(pattern.as_deref())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR username ILIKE $1 OR email ILIKE $1",
    )
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok((users, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse battery").unwrap();

        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
