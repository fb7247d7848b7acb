use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn log_and_record(&self, ctx: &str) {
        let message = self.to_string();
        match self {
            AppError::Io(_) | AppError::Csv(_) | AppError::Json(_) | AppError::Internal(_) => {
                error!(error = %message, context = %ctx, "Internal error");
            }
            AppError::Http(_) | AppError::ExternalService(_) => {
                error!(error = %message, context = %ctx, "External service error");
            }
            AppError::Authentication(_) | AppError::Authorization(_) => {
                warn!(error = %message, context = %ctx, "Access denied");
            }
            AppError::NotFound(_) | AppError::Validation(_) => {
                warn!(error = %message, context = %ctx, "Rejected request");
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Io(_) => "io_error",
            AppError::Csv(_) => "csv_error",
            AppError::Json(_) => "json_error",
            AppError::Http(_) => "http_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Authorization(_) => "authorization_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Validation(_) => "validation_error",
            AppError::ExternalService(_) => "external_service_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Io(_) | AppError::Json(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Csv(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Http(_) | AppError::ExternalService(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log_and_record("http response");
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "kind": self.kind(),
            "error": self.to_string(),
        }))
    }
}
