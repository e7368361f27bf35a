//! # API de Reservas
//!
//! - `POST /api/reservations` crea una reserva si la franja tiene hueco y
//!   envía los emails de confirmación
//! - `GET /api/reservations?date=YYYY-MM-DD` lista las franjas libres de un día
//!
//! Ambas rutas son públicas y están limitadas por dirección de cliente.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::middleware::{log_error_chain, ErrorLogExt};
use super::{enforce_rate_limit, parse_json_body, AppError, AppResult, AppState};
use crate::db::{NewReservation, Reservation, ReservationError};
use crate::rate_limit::RateLimitAction;
use crate::validation::{is_valid_email, parse_hhmm, parse_iso_date, Fields, Schema, ValidationErrors};

const SLOT_FULLY_BOOKED: &str =
    "Lo sentimos, no quedan mesas disponibles para esa fecha y hora. Por favor, elige otro horario.";
const DUPLICATE_RESERVATION: &str = "Ya existe una reserva con este email para esa fecha y hora.";
const INVALID_RESERVATION_TIME: &str = "La fecha y hora de la reserva deben ser posteriores al momento actual.";

const MAX_PARTY_SIZE: i64 = 20;

impl Schema for NewReservation {
    fn safe_parse(payload: &Value) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let fields = Fields::new(payload, &mut errors)?;

        let name = fields
            .required_string("name", &mut errors)
            .map(|name| name.trim().to_string());
        if let Some(name) = &name {
            let length = name.chars().count();
            if length < 2 {
                errors.push("name", "El nombre debe tener al menos 2 caracteres");
            } else if length > 100 {
                errors.push("name", "El nombre no puede superar los 100 caracteres");
            }
        }

        let email = fields
            .required_string("email", &mut errors)
            .map(|email| email.trim().to_lowercase());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.push("email", "Email inválido");
            }
        }

        let phone = fields
            .optional_string("phone", &mut errors)
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());
        if phone.as_ref().is_some_and(|phone| phone.chars().count() > 30) {
            errors.push("phone", "El teléfono no puede superar los 30 caracteres");
        }

        let reservation_date = fields
            .required_string("reservation_date", &mut errors)
            .and_then(|value| {
                let date = parse_iso_date(&value);
                if date.is_none() {
                    errors.push("reservation_date", "Fecha inválida, use YYYY-MM-DD");
                }
                date
            });

        let reservation_time = fields
            .required_string("reservation_time", &mut errors)
            .and_then(|value| {
                let time = parse_hhmm(&value);
                if time.is_none() {
                    errors.push("reservation_time", "Hora inválida, use HH:MM");
                }
                time
            });

        let party_size = fields
            .required_integer("party_size", &mut errors)
            .and_then(|size| {
                if (1..=MAX_PARTY_SIZE).contains(&size) {
                    u32::try_from(size).ok()
                } else {
                    errors.push(
                        "party_size",
                        &format!("El número de personas debe estar entre 1 y {}", MAX_PARTY_SIZE),
                    );
                    None
                }
            });

        let special_requests = fields
            .optional_string("special_requests", &mut errors)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if special_requests.as_ref().is_some_and(|text| text.chars().count() > 500) {
            errors.push("special_requests", "Las peticiones especiales no pueden superar los 500 caracteres");
        }

        errors.into_result()?;

        match (name, email, reservation_date, reservation_time, party_size) {
            (Some(name), Some(email), Some(reservation_date), Some(reservation_time), Some(party_size)) => {
                Ok(NewReservation {
                    name,
                    email,
                    phone,
                    reservation_date,
                    reservation_time,
                    party_size,
                    special_requests,
                })
            }
            _ => Err(ValidationErrors::single("body", "Datos de reserva incompletos")),
        }
    }
}

/// Proyección de la reserva que se devuelve al cliente
#[derive(Debug, Serialize)]
struct ReservationSummary {
    id: String,
    name: String,
    reservation_date: String,
    reservation_time: String,
    party_size: u32,
    status: &'static str,
}

impl From<&Reservation> for ReservationSummary {
    fn from(reservation: &Reservation) -> Self {
        ReservationSummary {
            id: reservation.id.clone(),
            name: reservation.name.clone(),
            reservation_date: reservation.reservation_date.to_string(),
            reservation_time: reservation.time_label(),
            party_size: reservation.party_size,
            status: reservation.status.as_str(),
        }
    }
}

/// Parámetros de consulta de disponibilidad
#[derive(Deserialize)]
struct AvailabilityQuery {
    date: Option<String>,
}

/// Traduce los errores tipados del servicio a respuestas HTTP
fn reservation_error(error: ReservationError) -> AppError {
    match error {
        ReservationError::DuplicateReservation => AppError::Conflict(DUPLICATE_RESERVATION.to_string()),
        ReservationError::InvalidReservationTime => {
            AppError::BadRequest(INVALID_RESERVATION_TIME.to_string())
        }
        ReservationError::SlotFullyBooked { .. } => AppError::Conflict(SLOT_FULLY_BOOKED.to_string()),
        error @ ReservationError::Database { .. } => {
            log_error_chain(&error, Some("reservation service"));
            AppError::internal_trace(&error.to_string(), None)
        }
    }
}

/// Crea una nueva reserva
///
/// # Orden de operaciones
/// 1. Límite `reservation-create` por cliente
/// 2. Validación del cuerpo
/// 3. Comprobación de disponibilidad de la franja
/// 4. Creación de la reserva
/// 5. Emails de confirmación (un fallo solo se registra)
///
/// # Respuesta (201)
/// ```json
/// {
///   "success": true,
///   "message": "Reserva creada correctamente",
///   "reservation": {
///     "id": "0b6e3c1e-6a55-4c7f-9a57-2a8f8f0f7f11",
///     "name": "Ana García",
///     "reservation_date": "2025-06-01",
///     "reservation_time": "20:30",
///     "party_size": 4,
///     "status": "pending"
///   }
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Campos inválidos o fecha/hora no futura
/// - `409 Conflict`: Franja completa o reserva duplicada
/// - `429 Too Many Requests`: Límite de creación superado
/// - `500 Internal Server Error`: Cuerpo no JSON o fallo del servicio
#[post("/api/reservations")]
async fn create_reservation(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    enforce_rate_limit(&state, RateLimitAction::ReservationCreate, &req)?;

    let payload = parse_json_body(&body)?;
    let data = NewReservation::safe_parse(&payload)?;

    let available = state
        .reservations
        .check_slot_availability(data.reservation_date, data.reservation_time)
        .await
        .map_err(reservation_error)?;

    if !available {
        return Err(AppError::Conflict(SLOT_FULLY_BOOKED.to_string()));
    }

    let reservation = state
        .reservations
        .create_reservation(data)
        .await
        .map_err(reservation_error)?;

    tracing::info!(
        id = %reservation.id,
        date = %reservation.reservation_date,
        time = %reservation.time_label(),
        party_size = reservation.party_size,
        "Reserva creada"
    );

    // La reserva ya existe: un fallo de email no cambia la respuesta
    state
        .emails
        .send_reservation_emails(&reservation)
        .await
        .log_warn_context("sending reservation emails")
        .ok();

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Reserva creada correctamente",
        "reservation": ReservationSummary::from(&reservation)
    })))
}

/// Lista las franjas libres de una fecha
///
/// # Respuesta
/// ```json
/// {
///   "success": true,
///   "date": "2025-06-01",
///   "slots": [ { "time": "20:00", "remaining": 3 } ]
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Falta `date` o no es una fecha `YYYY-MM-DD` válida
/// - `429 Too Many Requests`: Límite de consultas superado
/// - `500 Internal Server Error`: Fallo del servicio
#[get("/api/reservations")]
async fn available_slots(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    enforce_rate_limit(&state, RateLimitAction::ReservationCheck, &req)?;

    let query = web::Query::<AvailabilityQuery>::from_query(req.query_string())
        .map_err(|_| AppError::validation_field("date", "Parámetros de consulta inválidos"))?;

    let raw_date = query
        .date
        .as_deref()
        .map(str::trim)
        .filter(|date| !date.is_empty())
        .ok_or_else(|| AppError::validation_field("date", "El parámetro 'date' es requerido"))?;

    let date = parse_iso_date(raw_date)
        .ok_or_else(|| AppError::validation_field("date", "Fecha inválida, use YYYY-MM-DD"))?;

    let slots = state
        .reservations
        .get_available_slots(date)
        .await
        .map_err(reservation_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "date": date.to_string(),
        "slots": slots
    })))
}

/// Configura las rutas relacionadas con reservas
///
/// # Rutas disponibles
/// - `POST /api/reservations` - Crear nueva reserva
/// - `GET /api/reservations?date=YYYY-MM-DD` - Franjas disponibles
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_reservation);
    cfg.service(available_slots);
}
