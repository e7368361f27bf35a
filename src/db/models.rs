use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Estado del ciclo de vida de una reserva
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Datos validados de una reserva que todavía no existe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: u32,
    pub special_requests: Option<String>,
}

/// Reserva persistida por el servicio de reservas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub reservation_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub reservation_time: NaiveTime,
    pub party_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    pub status: ReservationStatus,
    pub created_at: i64, // timestamp unix
}

impl Reservation {
    pub fn time_label(&self) -> String {
        format_hhmm(self.reservation_time)
    }
}

/// Franja horaria libre de una fecha
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Hora en formato `HH:MM`
    pub time: String,
    /// Reservas que todavía admite la franja
    pub remaining: u32,
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Las horas se guardan como `HH:MM`, igual que llegan en la API
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let value = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&value, "%H:%M").map_err(serde::de::Error::custom)
    }
}
