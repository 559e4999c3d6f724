use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt::{Display, Formatter};

use crate::models::pagination::PaginationMeta;

#[derive(Debug, PartialEq)]
pub enum AppErrorType {
    NotFoundError,
    DbError,
    AuthError,
    JsonParseError,
    PayloadValidationError,
    ConflictError,
    GatewayError,
    InternalServerError,
    ForbiddenError,
}

#[derive(Debug, PartialEq)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: Option<String>,
    pub cause: Option<String>,
    pub details: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct AppErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl AppError {
    fn new(error_type: AppErrorType, error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type,
            message: Some(error.to_string()),
            details: None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError {
                error_type: AppErrorType::DbError,
                ..
            } => "An unexpected error has occurred".to_string(),

            AppError {
                message: Some(message),
                ..
            } => message.clone(),

            AppError {
                message: None,
                error_type: AppErrorType::NotFoundError,
                ..
            } => "The requested item was not found".to_string(),
            _ => "An unexpected error has occurred".to_string(),
        }
    }

    pub fn db_error(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::DbError, error)
    }

    pub fn not_found(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::NotFoundError, error)
    }

    pub fn bad_request(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::PayloadValidationError, error)
    }

    pub fn conflict(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::ConflictError, error)
    }

    pub fn gateway_error(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::GatewayError, error)
    }

    pub fn forbidden_error(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::ForbiddenError, error)
    }

    pub fn unauthorized(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::AuthError, error)
    }

    pub fn internal_error(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::InternalServerError, error)
    }

    pub fn json_parse_error(error: impl ToString) -> AppError {
        AppError::new(AppErrorType::JsonParseError, error)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError {
            message: None,
            cause: Some(error.to_string()),
            error_type: AppErrorType::InternalServerError,
            details: None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => AppError::not_found("The requested item was not found"),
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => AppError {
                cause: Some(error.to_string()),
                error_type: AppErrorType::ConflictError,
                message: Some("A record with the same unique fields already exists".to_string()),
                details: None,
            },
            sqlx::Error::Database(db_error) if db_error.is_foreign_key_violation() => AppError {
                cause: Some(error.to_string()),
                error_type: AppErrorType::PayloadValidationError,
                message: Some("A referenced record does not exist".to_string()),
                details: None,
            },
            _ => AppError::db_error(error),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(errors.field_errors())
            .unwrap_or(serde_json::Value::Null);
        AppError {
            cause: Some(errors.to_string()),
            error_type: AppErrorType::PayloadValidationError,
            message: Some("The submitted data is invalid".to_string()),
            details: Some(details),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            AppErrorType::AuthError => StatusCode::UNAUTHORIZED,
            AppErrorType::DbError | AppErrorType::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppErrorType::NotFoundError => StatusCode::NOT_FOUND,
            AppErrorType::PayloadValidationError | AppErrorType::JsonParseError => {
                StatusCode::BAD_REQUEST
            }
            AppErrorType::ConflictError => StatusCode::CONFLICT,
            AppErrorType::GatewayError => StatusCode::BAD_GATEWAY,
            AppErrorType::ForbiddenError => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(
                error.cause = ?self.cause,
                error.kind = ?self.error_type,
                "request failed"
            );
        }
        HttpResponse::build(self.status_code()).json(AppErrorResponse {
            success: false,
            message: self.message(),
            errors: self.details.clone(),
        })
    }
}

#[derive(Serialize)]
pub struct AppSuccessResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl<T: Serialize> AppSuccessResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        AppSuccessResponse {
            success: true,
            data,
            message: message.into(),
            pagination: None,
        }
    }

    pub fn paginated(data: T, message: impl Into<String>, pagination: PaginationMeta) -> Self {
        AppSuccessResponse {
            success: true,
            data,
            message: message.into(),
            pagination: Some(pagination),
        }
    }
}
