// src/db/mod.rs
//! Servicio de reservas: contrato, errores tipados e implementaciones.

pub mod memory;
pub mod models;
pub mod mongodb;
pub mod rules;

pub use memory::InMemoryReservationService;
pub use models::{NewReservation, Reservation, ReservationStatus, Slot};
pub use self::mongodb::MongoRepo;
pub use rules::{ReservationRules, ServiceWindow};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Fallos del servicio de reservas que el API distingue por tipo
#[derive(Error, Debug)]
pub enum ReservationError {
    /// Ya existe una reserva con el mismo email, fecha y hora
    #[error("Reserva duplicada")]
    DuplicateReservation,

    /// La fecha y hora no están en el futuro
    #[error("La fecha y hora de la reserva deben ser futuras")]
    InvalidReservationTime,

    /// La franja se llenó entre la comprobación y la creación
    #[error("La franja {time} del {date} está completa")]
    SlotFullyBooked { date: NaiveDate, time: String },

    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: ::mongodb::error::Error,
    },
}

impl ReservationError {
    pub fn database(operation: &str, source: ::mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }
}

/// Operaciones que el API necesita del almacenamiento de reservas.
///
/// La comprobación de disponibilidad y la creación son llamadas separadas;
/// cada implementación debe impedir duplicados por su cuenta.
#[async_trait]
pub trait ReservationService: Send + Sync {
    async fn check_slot_availability(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ReservationError>;

    async fn create_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, ReservationError>;

    async fn get_available_slots(&self, date: NaiveDate) -> Result<Vec<Slot>, ReservationError>;
}
