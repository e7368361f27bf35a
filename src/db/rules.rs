//! Reglas de negocio compartidas por todas las implementaciones del servicio
//! de reservas: turnos de servicio, franjas, capacidad y estado inicial.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::models::{format_hhmm, ReservationStatus, Slot};
use super::ReservationError;
use crate::validation::parse_hhmm;

/// Turno de servicio, con primera y última hora de entrada incluidas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ServiceWindow {
    /// Parsea `HH:MM-HH:MM`
    pub fn parse(value: &str) -> Option<Self> {
        let (start, end) = value.trim().split_once('-')?;
        let start = parse_hhmm(start.trim())?;
        let end = parse_hhmm(end.trim())?;
        if end < start {
            return None;
        }
        Some(Self { start, end })
    }
}

/// Parsea una lista de turnos separada por comas: `13:00-15:30,20:00-22:30`
pub fn parse_service_hours(value: &str) -> Option<Vec<ServiceWindow>> {
    let windows = value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(ServiceWindow::parse)
        .collect::<Option<Vec<_>>>()?;

    if windows.is_empty() {
        None
    } else {
        Some(windows)
    }
}

#[derive(Debug, Clone)]
pub struct ReservationRules {
    pub windows: Vec<ServiceWindow>,
    pub slot_interval_minutes: u32,
    pub max_reservations_per_slot: u32,
    /// Si las reservas nuevas nacen confirmadas en lugar de pendientes
    pub auto_confirm: bool,
}

impl Default for ReservationRules {
    fn default() -> Self {
        let window = |start: (u32, u32), end: (u32, u32)| ServiceWindow {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or_default(),
        };

        Self {
            windows: vec![window((13, 0), (15, 30)), window((20, 0), (22, 30))],
            slot_interval_minutes: 30,
            max_reservations_per_slot: 4,
            auto_confirm: false,
        }
    }
}

impl ReservationRules {
    /// Todas las horas reservables del día, ordenadas y sin repetir
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(self.slot_interval_minutes.max(1)));
        let mut times = Vec::new();

        for window in &self.windows {
            let mut current = window.start;
            while current <= window.end {
                times.push(current);
                let (next, wrapped) = current.overflowing_add_signed(step);
                if wrapped != 0 {
                    break;
                }
                current = next;
            }
        }

        times.sort();
        times.dedup();
        times
    }

    pub fn is_bookable_time(&self, time: NaiveTime) -> bool {
        self.slot_times().contains(&time)
    }

    pub fn has_capacity(&self, active_reservations: u32) -> bool {
        active_reservations < self.max_reservations_per_slot
    }

    pub fn initial_status(&self) -> ReservationStatus {
        if self.auto_confirm {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        }
    }

    pub fn ensure_future(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<(), ReservationError> {
        if date.and_time(time) > now {
            Ok(())
        } else {
            Err(ReservationError::InvalidReservationTime)
        }
    }

    /// Franjas con hueco para `date`. Las horas ya pasadas no se ofrecen.
    pub fn available_slots(
        &self,
        date: NaiveDate,
        now: NaiveDateTime,
        taken: &HashMap<NaiveTime, u32>,
    ) -> Vec<Slot> {
        self.slot_times()
            .into_iter()
            .filter(|time| date.and_time(*time) > now)
            .filter_map(|time| {
                let used = taken.get(&time).copied().unwrap_or(0);
                let remaining = self.max_reservations_per_slot.saturating_sub(used);
                (remaining > 0).then(|| Slot {
                    time: format_hhmm(time),
                    remaining,
                })
            })
            .collect()
    }
}

/// Hora local del restaurante
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rules() -> ReservationRules {
        ReservationRules {
            windows: vec![ServiceWindow { start: t(13, 0), end: t(14, 0) }],
            slot_interval_minutes: 30,
            max_reservations_per_slot: 2,
            auto_confirm: false,
        }
    }

    #[test]
    fn slot_times_include_both_ends() {
        assert_eq!(rules().slot_times(), vec![t(13, 0), t(13, 30), t(14, 0)]);
        assert!(rules().is_bookable_time(t(13, 30)));
        assert!(!rules().is_bookable_time(t(13, 15)));
    }

    #[test]
    fn slot_times_stop_at_midnight() {
        let rules = ReservationRules {
            windows: vec![ServiceWindow { start: t(23, 0), end: t(23, 59) }],
            slot_interval_minutes: 45,
            ..rules()
        };
        assert_eq!(rules.slot_times(), vec![t(23, 0), t(23, 45)]);
    }

    #[test]
    fn available_slots_subtract_taken_and_skip_full() {
        let mut taken = HashMap::new();
        taken.insert(t(13, 0), 2);
        taken.insert(t(13, 30), 1);

        let now = d(2024, 1, 1).and_time(t(0, 0));
        let slots = rules().available_slots(d(2099, 6, 1), now, &taken);

        assert_eq!(
            slots,
            vec![
                Slot { time: "13:30".to_string(), remaining: 1 },
                Slot { time: "14:00".to_string(), remaining: 2 },
            ]
        );
    }

    #[test]
    fn available_slots_hide_past_times() {
        let today = d(2024, 6, 1);
        let now = today.and_time(t(13, 10));

        let slots = rules().available_slots(today, now, &HashMap::new());
        let times: Vec<_> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["13:30", "14:00"]);

        assert!(rules().available_slots(d(2024, 5, 31), now, &HashMap::new()).is_empty());
    }

    #[test]
    fn ensure_future_rejects_now_and_past() {
        let now = d(2024, 6, 1).and_time(t(13, 0));
        assert!(rules().ensure_future(d(2024, 6, 1), t(13, 30), now).is_ok());
        assert!(matches!(
            rules().ensure_future(d(2024, 6, 1), t(13, 0), now),
            Err(ReservationError::InvalidReservationTime)
        ));
    }

    #[test]
    fn parses_service_hours() {
        let windows = parse_service_hours("13:00-15:30, 20:00-22:30").unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].start, t(20, 0));

        assert!(parse_service_hours("").is_none());
        assert!(parse_service_hours("15:00-13:00").is_none());
        assert!(parse_service_hours("13h-15h").is_none());
    }

    #[test]
    fn initial_status_follows_auto_confirm() {
        assert_eq!(rules().initial_status(), ReservationStatus::Pending);
        let auto = ReservationRules { auto_confirm: true, ..rules() };
        assert_eq!(auto.initial_status(), ReservationStatus::Confirmed);
    }
}
