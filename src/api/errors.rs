//! # Manejo de errores del API
//!
//! Cada variante de [`AppError`] corresponde a una categoría de fallo con su
//! código HTTP. Los errores internos solo exponen al cliente un trace id; el
//! detalle queda en el log.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::rate_limit::rate_limit_response;
use crate::validation::{FieldError, ValidationErrors};

#[derive(Error, Debug)]
pub enum AppError {
    /// Payload con campos ausentes o mal formados (400)
    #[error("Error de validación: {}", .0.summary())]
    Validation(ValidationErrors),

    /// Petición bien formada pero no aceptable (400)
    #[error("Petición inválida: {0}")]
    BadRequest(String),

    /// Credenciales incorrectas (401)
    #[error("No autorizado: {0}")]
    Unauthorized(String),

    /// Franja completa o reserva duplicada (409)
    #[error("Conflicto: {0}")]
    Conflict(String),

    /// Límite de peticiones superado (429)
    #[error("Límite de peticiones superado para '{action}' por '{client}'")]
    RateLimited {
        action: String,
        client: String,
        limit: u32,
        retry_after_secs: u64,
    },

    /// Error interno con código de rastreo (500)
    #[error("Error interno (trace: {trace_id}): {message}")]
    InternalWithTrace { trace_id: String, message: String },
}

impl AppError {
    /// Error de validación de un único campo
    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    /// Crea un error interno con trace ID
    pub fn internal_trace(message: &str, trace_id: Option<String>) -> Self {
        Self::InternalWithTrace {
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message: message.to_string(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalWithTrace { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Validation(errors) => {
                tracing::warn!(errors = %errors.summary(), "Validation error");
                HttpResponse::BadRequest().json(ErrorResponse {
                    success: false,
                    error: "Datos inválidos".to_string(),
                    message: errors.summary(),
                    details: Some(errors.fields().to_vec()),
                })
            }
            Self::BadRequest(message) => {
                tracing::warn!(message = %message, "Bad request");
                HttpResponse::BadRequest().json(ErrorResponse::new("Petición inválida", message))
            }
            Self::Unauthorized(reason) => {
                tracing::warn!(reason = %reason, "Unauthorized access attempt");
                HttpResponse::Unauthorized().json(ErrorResponse::new("No autorizado", reason))
            }
            Self::Conflict(message) => {
                tracing::info!(message = %message, "Conflict");
                HttpResponse::Conflict().json(ErrorResponse::new("Conflicto", message))
            }
            Self::RateLimited {
                action,
                client,
                limit,
                retry_after_secs,
            } => {
                tracing::warn!(
                    action = %action,
                    client = %client,
                    limit = limit,
                    retry_after_secs = retry_after_secs,
                    "Rate limit exceeded"
                );
                rate_limit_response(*limit, *retry_after_secs)
            }
            Self::InternalWithTrace { trace_id, message } => {
                tracing::error!(
                    trace_id = %trace_id,
                    message = %message,
                    "Internal error with trace"
                );
                HttpResponse::InternalServerError().json(ErrorResponse::new(
                    "Error interno",
                    &format!("Error interno del servidor (trace: {})", trace_id),
                ))
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
            details: None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub trait ResultExt<T> {
    fn map_err_internal(self, message: &str) -> AppResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + 'static,
{
    fn map_err_internal(self, message: &str) -> AppResult<T> {
        self.map_err(|e| AppError::internal_trace(&format!("{}: {}", message, e), None))
    }
}
