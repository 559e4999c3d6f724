use actix_web::dev::Payload;
use actix_web::{http, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::core::config::JwtAuthConfig;
use crate::core::AppError;
use crate::models::users::{Role, User};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user ID
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: usize,
    pub exp: usize,
}

impl JwtClaims {
    pub fn for_user(user: &User, token_type: TokenType, config: &JwtAuthConfig) -> Self {
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => Duration::minutes(config.token_expiration_time),
            TokenType::Refresh => Duration::days(config.refresh_token_expiration_days),
        };

        JwtClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            token_type,
            iat: now.timestamp() as usize,
            exp: (now + lifetime).timestamp() as usize,
        }
    }

    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid user ID in token"))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden_error(
                "Access denied. Admin role required.",
            ))
        }
    }
}

pub fn generate_jwt_token(claims: &JwtClaims, config: &JwtAuthConfig) -> Result<String, AppError> {
    let encoding_key = EncodingKey::from_secret(config.secret.expose_secret().as_bytes());

    encode(&Header::default(), claims, &encoding_key)
        .map_err(|_| AppError::internal_error("Failed to generate JWT token"))
}

pub fn decode_jwt_token(
    token: &str,
    expected: TokenType,
    config: &JwtAuthConfig,
) -> Result<JwtClaims, AppError> {
    let decoding_key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

    let claims = decode::<JwtClaims>(token, &decoding_key, &Validation::default())
        .map_err(|_| AppError::unauthorized("Invalid token"))?
        .claims;

    if claims.token_type != expected {
        return Err(AppError::unauthorized("Invalid token type"));
    }

    Ok(claims)
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequest for JwtClaims {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let Some(config) = req.app_data::<web::Data<JwtAuthConfig>>() else {
            return ready(Err(AppError::internal_error(
                "JWT configuration is not registered",
            )));
        };

        let Some(token) = bearer_token(req) else {
            return ready(Err(AppError::unauthorized(
                "Authentication credentials were not provided",
            )));
        };

        ready(decode_jwt_token(token, TokenType::Access, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use secrecy::Secret;

    fn config() -> JwtAuthConfig {
        JwtAuthConfig {
            secret: Secret::new("test-secret".to_string()),
            token_expiration_time: 5,
            refresh_token_expiration_days: 1,
        }
    }

    fn claims(token_type: TokenType) -> JwtClaims {
        let now = Utc::now().timestamp() as usize;
        JwtClaims {
            sub: "42".to_string(),
            username: "viewer".to_string(),
            role: Role::User,
            token_type,
            iat: now,
            exp: now + 300,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let config = config();
        let token = generate_jwt_token(&claims(TokenType::Access), &config).unwrap();

        let decoded = decode_jwt_token(&token, TokenType::Access, &config).unwrap();

        assert_eq!(decoded.user_id().unwrap(), 42);
        assert_eq!(decoded.username, "viewer");
        assert!(!decoded.is_admin());
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access_token() {
        let config = config();
        let token = generate_jwt_token(&claims(TokenType::Refresh), &config).unwrap();

        let err = decode_jwt_token(&token, TokenType::Access, &config).unwrap_err();

        assert_eq!(err.error_type, crate::core::AppErrorType::AuthError);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let mut other = config();
        other.secret = Secret::new("another-secret".to_string());
        let token = generate_jwt_token(&claims(TokenType::Access), &other).unwrap();

        assert!(decode_jwt_token(&token, TokenType::Access, &config()).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let req = TestRequest::default()
            .insert_header((http::header::AUTHORIZATION, "Token abc"))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = TestRequest::default()
            .insert_header((http::header::AUTHORIZATION, "Bearer abc"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc"));
    }

    #[test]
    fn non_admin_is_forbidden_from_admin_actions() {
        let err = claims(TokenType::Access).require_admin().unwrap_err();
        assert_eq!(err.error_type, crate::core::AppErrorType::ForbiddenError);
    }
}
