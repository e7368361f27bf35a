use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection, Database};
use uuid::Uuid;

use super::models::{format_hhmm, NewReservation, Reservation, Slot};
use super::rules::{local_now, ReservationRules};
use super::{ReservationError, ReservationService};

pub type Result<T> = std::result::Result<T, ReservationError>;

/// Código de MongoDB para violación de índice único
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Las reservas canceladas no cuentan para duplicados ni para el aforo.
///
/// Los índices parciales no admiten `$ne`, así que se enumeran los estados activos
/// (`$in` en `partialFilterExpression` requiere MongoDB 6.0).
fn active_reservation_filter() -> Document {
    doc! { "status": { "$in": ["pending", "confirmed"] } }
}

#[derive(Debug, Clone)]
pub struct MongoRepo {
    database: Database,
    rules: ReservationRules,
}

impl MongoRepo {
    pub async fn init(uri: &str, database_name: &str, rules: ReservationRules) -> Result<MongoRepo> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| ReservationError::database("connect", e))?;

        let database = client.database(database_name);

        // Test connection
        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| ReservationError::database("ping", e))?;

        tracing::info!(database = %database_name, "Conexión a MongoDB establecida exitosamente");

        Ok(MongoRepo {
            database,
            rules,
        })
    }

    pub fn reservations(&self) -> Collection<Reservation> {
        self.database.collection("reservations")
    }

    /// El índice único (email, fecha, hora) es el que detecta reservas duplicadas
    /// cuando dos peticiones pasan a la vez la comprobación de disponibilidad.
    pub async fn create_indexes(&self) -> Result<()> {
        use mongodb::{options::IndexOptions, IndexModel};

        let reservation_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "reservation_date": 1, "reservation_time": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "email": 1, "reservation_date": 1, "reservation_time": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(active_reservation_filter())
                        .build(),
                )
                .build(),
        ];

        self.reservations()
            .create_indexes(reservation_indexes)
            .await
            .map_err(|e| ReservationError::database("create_indexes", e))?;

        tracing::info!("Índices MongoDB creados exitosamente");
        Ok(())
    }

    fn active_filter(date: NaiveDate) -> Document {
        doc! {
            "reservation_date": date.to_string(),
            "status": { "$ne": "cancelled" }
        }
    }

    async fn active_at(&self, date: NaiveDate, time: NaiveTime) -> Result<u32> {
        let mut filter = Self::active_filter(date);
        filter.insert("reservation_time", format_hhmm(time));

        let count = self
            .reservations()
            .count_documents(filter)
            .await
            .map_err(|e| ReservationError::database("count_slot_reservations", e))?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl ReservationService for MongoRepo {
    async fn check_slot_availability(&self, date: NaiveDate, time: NaiveTime) -> Result<bool> {
        if !self.rules.is_bookable_time(time) {
            return Ok(false);
        }
        let taken = self.active_at(date, time).await?;
        Ok(self.rules.has_capacity(taken))
    }

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation> {
        self.rules
            .ensure_future(new.reservation_date, new.reservation_time, local_now())?;

        let taken = self.active_at(new.reservation_date, new.reservation_time).await?;
        if !self.rules.has_capacity(taken) {
            return Err(ReservationError::SlotFullyBooked {
                date: new.reservation_date,
                time: format_hhmm(new.reservation_time),
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            reservation_date: new.reservation_date,
            reservation_time: new.reservation_time,
            party_size: new.party_size,
            special_requests: new.special_requests,
            status: self.rules.initial_status(),
            created_at: chrono::Utc::now().timestamp(),
        };

        match self.reservations().insert_one(&reservation).await {
            Ok(_) => Ok(reservation),
            Err(e) if is_duplicate_key(&e) => Err(ReservationError::DuplicateReservation),
            Err(e) => Err(ReservationError::database("insert_reservation", e)),
        }
    }

    async fn get_available_slots(&self, date: NaiveDate) -> Result<Vec<Slot>> {
        let mut cursor = self
            .reservations()
            .find(Self::active_filter(date))
            .await
            .map_err(|e| ReservationError::database("find_reservations", e))?;

        let mut taken: HashMap<NaiveTime, u32> = HashMap::new();
        while cursor
            .advance()
            .await
            .map_err(|e| ReservationError::database("iterate_reservations", e))?
        {
            let reservation = cursor
                .deserialize_current()
                .map_err(|e| ReservationError::database("deserialize_reservation", e))?;
            *taken.entry(reservation.reservation_time).or_default() += 1;
        }

        Ok(self.rules.available_slots(date, local_now(), &taken))
    }
}
