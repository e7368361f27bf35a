use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{format_hhmm, NewReservation, Reservation, ReservationStatus, Slot};
use super::rules::{local_now, ReservationRules};
use super::{ReservationError, ReservationService};

/// Servicio de reservas en memoria, para desarrollo local y tests.
///
/// Comprueba duplicados y capacidad dentro del mismo bloqueo de escritura en
/// que inserta, así que dos creaciones concurrentes no pueden pasarse de aforo.
#[derive(Debug)]
pub struct InMemoryReservationService {
    rules: ReservationRules,
    reservations: RwLock<Vec<Reservation>>,
}

impl InMemoryReservationService {
    pub fn new(rules: ReservationRules) -> Self {
        Self {
            rules,
            reservations: RwLock::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub async fn all(&self) -> Vec<Reservation> {
        self.reservations.read().await.clone()
    }

    fn active_on(reservations: &[Reservation], date: NaiveDate) -> impl Iterator<Item = &Reservation> {
        reservations
            .iter()
            .filter(move |r| r.reservation_date == date && r.status != ReservationStatus::Cancelled)
    }

    fn active_at(reservations: &[Reservation], date: NaiveDate, time: NaiveTime) -> u32 {
        let count = Self::active_on(reservations, date)
            .filter(|r| r.reservation_time == time)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl ReservationService for InMemoryReservationService {
    async fn check_slot_availability(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ReservationError> {
        if !self.rules.is_bookable_time(time) {
            return Ok(false);
        }
        let reservations = self.reservations.read().await;
        Ok(self.rules.has_capacity(Self::active_at(&reservations, date, time)))
    }

    async fn create_reservation(
        &self,
        new: NewReservation,
    ) -> Result<Reservation, ReservationError> {
        self.rules
            .ensure_future(new.reservation_date, new.reservation_time, local_now())?;

        let mut reservations = self.reservations.write().await;

        let duplicate = Self::active_on(&reservations, new.reservation_date).any(|r| {
            r.reservation_time == new.reservation_time && r.email.eq_ignore_ascii_case(&new.email)
        });
        if duplicate {
            return Err(ReservationError::DuplicateReservation);
        }

        let taken = Self::active_at(&reservations, new.reservation_date, new.reservation_time);
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

        reservations.push(reservation.clone());
        tracing::debug!(id = %reservation.id, "Reserva guardada en memoria");
        Ok(reservation)
    }

    async fn get_available_slots(&self, date: NaiveDate) -> Result<Vec<Slot>, ReservationError> {
        let reservations = self.reservations.read().await;

        let mut taken: HashMap<NaiveTime, u32> = HashMap::new();
        for reservation in Self::active_on(&reservations, date) {
            *taken.entry(reservation.reservation_time).or_default() += 1;
        }

        Ok(self.rules.available_slots(date, local_now(), &taken))
    }
}
