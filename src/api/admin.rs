//! # API de administración
//!
//! Login con la contraseña de administración configurada. Un login correcto
//! deja la cookie `admin_session` limitada a `/admin` durante una hora.

use std::sync::Arc;

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use super::{client_identifier, enforce_rate_limit, parse_json_body, AppError, AppResult, AppState};
use crate::rate_limit::RateLimitAction;
use crate::validation::{Fields, Schema, ValidationErrors};

pub const ADMIN_SESSION_COOKIE: &str = "admin_session";
pub const ADMIN_COOKIE_PATH: &str = "/admin";
const SESSION_HOURS: i64 = 1;

/// Contraseña de administración. Nunca se imprime en `Debug`.
#[derive(Clone)]
pub struct AdminCredentials {
    password: Arc<str>,
}

impl AdminCredentials {
    pub fn new(password: &str) -> Self {
        Self {
            password: Arc::from(password),
        }
    }

    /// Comparación en tiempo constante
    pub fn verify(&self, candidate: &str) -> bool {
        self.password.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cuerpo de `POST /api/admin/login`
#[derive(Debug)]
pub struct LoginRequest {
    pub password: String,
}

impl Schema for LoginRequest {
    fn safe_parse(payload: &Value) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let fields = Fields::new(payload, &mut errors)?;

        let password = fields.required_string("password", &mut errors);
        if matches!(password.as_deref(), Some("")) {
            errors.push("password", "La contraseña es requerida");
        }

        errors.into_result()?;
        Ok(Self {
            password: password.unwrap_or_default(),
        })
    }
}

fn session_cookie() -> Cookie<'static> {
    Cookie::build(ADMIN_SESSION_COOKIE, "true")
        .path(ADMIN_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(Duration::hours(SESSION_HOURS))
        .finish()
}

/// Inicia la sesión de administración
///
/// # Respuesta
/// ```json
/// { "success": true, "message": "Sesión iniciada" }
/// ```
/// con `Set-Cookie: admin_session=true; HttpOnly; SameSite=Strict; Path=/admin; Max-Age=3600`
///
/// # Errores
/// - `400 Bad Request`: Falta la contraseña o no es un texto
/// - `401 Unauthorized`: Contraseña incorrecta
/// - `429 Too Many Requests`: Demasiados intentos desde la misma dirección
/// - `500 Internal Server Error`: Cuerpo no JSON u otro error inesperado
#[post("/api/admin/login")]
async fn admin_login(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    enforce_rate_limit(&state, RateLimitAction::AdminLogin, &req)?;

    let payload = parse_json_body(&body)?;
    let login = LoginRequest::safe_parse(&payload)?;

    if !state.admin.verify(&login.password) {
        return Err(AppError::Unauthorized("Contraseña incorrecta".to_string()));
    }

    tracing::info!(client = %client_identifier(&req), "Admin login");

    Ok(HttpResponse::Ok().cookie(session_cookie()).json(json!({
        "success": true,
        "message": "Sesión iniciada"
    })))
}

/// Cierra la sesión de administración borrando la cookie
#[post("/api/admin/logout")]
async fn admin_logout() -> HttpResponse {
    let mut cookie = session_cookie();
    cookie.make_removal();

    HttpResponse::Ok().cookie(cookie).json(json!({
        "success": true,
        "message": "Sesión cerrada"
    }))
}

/// Configura las rutas de administración
///
/// # Rutas disponibles
/// - `POST /api/admin/login` - Iniciar sesión
/// - `POST /api/admin/logout` - Cerrar sesión
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(admin_login);
    cfg.service(admin_logout);
}
