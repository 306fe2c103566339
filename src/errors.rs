use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Invalid or missing request input.
    Validation(String),
    /// Portal login refused (bad credentials).
    Unauthorized(String),
    /// The ERP login did not yield a usable bearer token.
    Authentication(String),
    /// The ERP rejected the cached bearer token (401/403). The token has
    /// already been discarded; the caller's next attempt logs in again.
    SessionExpired,
    /// Any other non-success status from the ERP gateway.
    Http { status: u16, body: String },
    /// The ERP response did not match the expected shape.
    Decode(String),
    /// Internal server error.
    Internal(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Authentication(msg) => write!(f, "ERP authentication failed: {}", msg),
            AppError::SessionExpired => write!(f, "ERP session expired"),
            AppError::Http { status, body } => {
                write!(f, "ERP returned HTTP {}: {}", status, body)
            }
            AppError::Decode(msg) => write!(f, "ERP response decode error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::Authentication(msg) => {
                tracing::error!("ERP authentication failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Falha na autenticação com o ERP".to_string(),
                )
            }
            AppError::SessionExpired => {
                tracing::warn!("ERP session expired, cached token discarded");
                (
                    StatusCode::BAD_GATEWAY,
                    "Sessão expirada. Tente novamente.".to_string(),
                )
            }
            AppError::Http { status, body } => {
                tracing::error!("ERP returned HTTP {}: {}", status, body);
                (
                    StatusCode::BAD_GATEWAY,
                    "Erro na comunicação com o ERP".to_string(),
                )
            }
            AppError::Decode(msg) => {
                tracing::error!("ERP response decode error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Resposta inválida do ERP".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno do servidor".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    ///
    /// Transport-level failures (connection refused, timeout) are not
    /// status-carrying, so they land in the unclassified bucket.
    fn from(err: reqwest::Error) -> Self {
        AppError::Internal(format!("ERP request failed: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    /// Converts a `serde_json::Error` into an `AppError`.
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Arguments
    ///
    /// * `f` - A closure that produces the context message.
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_http_status() {
        let err = AppError::Http {
            status: 503,
            body: "maintenance".to_string(),
        };
        let rendered = format!("{}", err);
        assert!(rendered.contains("503"));
        assert!(rendered.contains("maintenance"));
    }

    #[test]
    fn test_context_wraps_source() {
        let result: Result<(), AppError> = Err(AppError::SessionExpired);
        let wrapped = result.context("consultando títulos").unwrap_err();
        match wrapped {
            AppError::WithContext { source, context } => {
                assert_eq!(context, "consultando títulos");
                assert!(matches!(*source, AppError::SessionExpired));
            }
            other => panic!("expected WithContext, got {:?}", other),
        }
    }
}
