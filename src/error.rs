use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("couldn't find group {0}")]
    GroupNotFound(String),
    #[error("couldn't find expense {0}")]
    ExpenseNotFound(String),
    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),
    #[error("split total {assigned} doesn't reconcile with expense amount {amount}")]
    SplitMismatch { assigned: f64, amount: f64 },
    #[error("a settlement needs two distinct members")]
    SelfSettlement,
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::GroupNotFound(_) | AppError::ExpenseNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidAmount(_)
            | AppError::SplitMismatch { .. }
            | AppError::SelfSettlement => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Database(err) = self {
            tracing::error!(error = %err, "database operation failed");
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
