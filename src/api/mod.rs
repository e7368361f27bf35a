//! # Módulo API
//!
//! Rutas HTTP y piezas comunes a todos los handlers.
//!
//! ## Módulos principales
//!
//! - [`admin`] - Login y logout de administración
//! - [`reservation`] - Creación de reservas y consulta de disponibilidad
//! - [`errors`] - Manejo de errores de la aplicación

pub mod admin;
pub mod errors;
mod middleware;
pub mod reservation;

// Re-exportar tipos comunes para facilitar su uso
pub use admin::AdminCredentials;
pub use errors::{AppError, AppResult, ErrorResponse, ResultExt};

use std::sync::Arc;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde_json::Value;

use crate::db::ReservationService;
use crate::email::EmailService;
use crate::rate_limit::{RateLimitAction, RateLimitResult, RateLimiter};

/// Identificador usado cuando la petición no trae dirección de cliente
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Dependencias compartidas por los handlers
#[derive(Clone)]
pub struct AppState {
    pub admin: AdminCredentials,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub reservations: Arc<dyn ReservationService>,
    pub emails: Arc<dyn EmailService>,
}

impl AppState {
    pub fn new(
        admin: AdminCredentials,
        rate_limiter: Arc<dyn RateLimiter>,
        reservations: Arc<dyn ReservationService>,
        emails: Arc<dyn EmailService>,
    ) -> Self {
        Self {
            admin,
            rate_limiter,
            reservations,
            emails,
        }
    }
}

/// Dirección del cliente según los headers del proxy.
///
/// Usa la primera entrada de `X-Forwarded-For`, después `X-Real-IP` y, si no
/// hay ninguna, [`UNKNOWN_CLIENT`].
pub fn client_identifier(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .and_then(|value| value.split(',').next().map(|first| first.trim().to_string()))
        .filter(|value| !value.is_empty())
        .or_else(|| header("x-real-ip").map(|value| value.trim().to_string()))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Corta la petición con `RateLimited` si el cliente superó el límite de `action`
pub fn enforce_rate_limit(
    state: &AppState,
    action: RateLimitAction,
    req: &HttpRequest,
) -> AppResult<()> {
    let client = client_identifier(req);

    match state.rate_limiter.check(action, &client) {
        RateLimitResult::Allowed => Ok(()),
        RateLimitResult::Limited {
            limit,
            retry_after_secs,
        } => Err(AppError::RateLimited {
            action: action.to_string(),
            client,
            limit,
            retry_after_secs,
        }),
    }
}

/// Parsea el cuerpo como JSON. Un cuerpo que no es JSON se trata como error
/// inesperado (500), no como error de validación.
pub(crate) fn parse_json_body(body: &[u8]) -> AppResult<Value> {
    serde_json::from_slice(body).map_err_internal("Cuerpo de la petición no es JSON válido")
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Configura todas las rutas de la API
///
/// ## Rutas configuradas
///
/// - `/api/admin/*` - Ver [`admin::routes`]
/// - `/api/reservations` - Ver [`reservation::routes`]
/// - `/health` - Comprobación de vida
///
/// # Ejemplo
///
/// ```no_run
/// use actix_web::{web, App};
/// use pispas_bookings::api;
///
/// let app = App::new()
///     .configure(api::init_routes);
/// ```
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    admin::routes(cfg);
    reservation::routes(cfg);
    cfg.service(health);
}
