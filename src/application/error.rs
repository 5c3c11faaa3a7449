//! Application-level error type and its HTTP projection.
//!
//! Handlers return `Result<_, AppError>`; the `IntoResponse` impl is the
//! single place status codes and wire error bodies are decided. Internal
//! detail is logged, never leaked to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use super::auth::AuthError;
use super::repos::RepoError;
use crate::domain::error::DomainError;
use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<i64>,
}

impl ErrorReport {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            balance: None,
            required: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, report) = match &self {
            AppError::Domain(DomainError::NotFound { entity }) => (
                StatusCode::NOT_FOUND,
                ErrorReport::new("NOT_FOUND", format!("{entity} not found")),
            ),
            AppError::Ledger(LedgerError::InsufficientCredits { balance, required }) => {
                let mut report =
                    ErrorReport::new("PAYMENT_REQUIRED", "insufficient credits");
                report.balance = Some(*balance);
                report.required = Some(*required);
                (StatusCode::PAYMENT_REQUIRED, report)
            }
            AppError::Ledger(LedgerError::InvalidCost { cost }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorReport::new("VALIDATION", format!("invalid unlock cost {cost}")),
            ),
            AppError::Ledger(LedgerError::Conflict { .. }) => {
                error!(error = %self, "ledger compensation failed");
                (
                    StatusCode::CONFLICT,
                    ErrorReport::new("LEDGER_CONFLICT", "unlock could not be settled, retry"),
                )
            }
            AppError::Ledger(LedgerError::Store(_)) | AppError::Repo(_) => {
                error!(error = %self, "persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorReport::new("INTERNAL", "internal error"),
                )
            }
            AppError::Auth(_) => {
                warn!(error = %self, "rejected identity material");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorReport::new("UNAUTHORIZED", "invalid identity"),
                )
            }
        };

        metrics::counter!("hireboard_errors_total", "code" => report.code).increment(1);
        (status, Json(report)).into_response()
    }
}
