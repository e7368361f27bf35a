//! # Validación de esquemas
//!
//! Convierte un `serde_json::Value` sin tipar en un valor tipado o en una
//! lista de errores por campo. Cada cuerpo de petición implementa [`Schema`].
//!
//! ```rust
//! use pispas_bookings::validation::{Fields, Schema, ValidationErrors};
//! use serde_json::{json, Value};
//!
//! struct Ping {
//!     message: String,
//! }
//!
//! impl Schema for Ping {
//!     fn safe_parse(payload: &Value) -> Result<Self, ValidationErrors> {
//!         let mut errors = ValidationErrors::default();
//!         let fields = Fields::new(payload, &mut errors)?;
//!         let message = fields.required_string("message", &mut errors);
//!         errors.into_result()?;
//!         Ok(Ping { message: message.unwrap_or_default() })
//!     }
//! }
//!
//! assert!(Ping::safe_parse(&json!({ "message": "hola" })).is_ok());
//! assert!(Ping::safe_parse(&json!({})).is_err());
//! ```

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Error asociado a un campo concreto del payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Conjunto de errores de validación acumulados durante un parseo
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    /// Resumen legible de todos los errores, en el orden en que se detectaron
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Devuelve `Err(self)` si se acumuló algún error
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Equivalente tipado de `safeParse`: valida un payload sin tipar
pub trait Schema: Sized {
    fn safe_parse(payload: &Value) -> Result<Self, ValidationErrors>;
}

/// Acceso a los campos de un objeto JSON acumulando errores
pub struct Fields<'a> {
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    /// Falla inmediatamente si el payload no es un objeto JSON
    pub fn new(payload: &'a Value, errors: &mut ValidationErrors) -> Result<Self, ValidationErrors> {
        match payload.as_object() {
            Some(object) => Ok(Self { object }),
            None => {
                errors.push("body", "Se esperaba un objeto JSON");
                Err(std::mem::take(errors))
            }
        }
    }

    fn present(&self, name: &str) -> Option<&'a Value> {
        self.object.get(name).filter(|value| !value.is_null())
    }

    pub fn required_string(&self, name: &str, errors: &mut ValidationErrors) -> Option<String> {
        match self.present(name) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => {
                errors.push(name, "Debe ser un texto");
                None
            }
            None => {
                errors.push(name, "Campo requerido");
                None
            }
        }
    }

    pub fn optional_string(&self, name: &str, errors: &mut ValidationErrors) -> Option<String> {
        match self.present(name) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => {
                errors.push(name, "Debe ser un texto");
                None
            }
            None => None,
        }
    }

    pub fn required_integer(&self, name: &str, errors: &mut ValidationErrors) -> Option<i64> {
        match self.present(name) {
            Some(Value::Number(number)) => match number.as_i64() {
                Some(value) => Some(value),
                None => {
                    errors.push(name, "Debe ser un número entero");
                    None
                }
            },
            Some(_) => {
                errors.push(name, "Debe ser un número");
                None
            }
            None => {
                errors.push(name, "Campo requerido");
                None
            }
        }
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("patrón de fecha válido"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{2}:\d{2}$").expect("patrón de hora válido"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("patrón de email válido")
    })
}

/// Parsea una fecha `YYYY-MM-DD`: primero el patrón fijo, después el calendario.
///
/// `2024-13-40` cumple el patrón pero no es una fecha real, así que devuelve `None`.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if !date_pattern().is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Parsea una hora `HH:MM` de 24 horas
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    if !time_pattern().is_match(value) {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && email_pattern().is_match(value)
}
