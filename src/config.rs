//! # Configuración
//!
//! Todo se lee de variables de entorno (el binario carga antes `.env` con
//! `dotenvy`):
//!
//! ```env
//! # Servidor
//! BIND_ADDRESS=0.0.0.0:8080
//! STATIC_DIR=./static
//!
//! # Obligatoria: sin ella el servidor no arranca
//! ADMIN_PASSWORD=cambia-esto
//!
//! # Almacenamiento de reservas: mongodb | memory
//! RESERVATION_STORE=mongodb
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=pispas_bookings
//!
//! # Reglas de reserva
//! SERVICE_HOURS=13:00-15:30,20:00-22:30
//! SLOT_INTERVAL_MINUTES=30
//! MAX_RESERVATIONS_PER_SLOT=4
//! AUTO_CONFIRM=false
//!
//! # Límites (max/ventana_en_segundos)
//! RATE_LIMIT_ENABLED=true
//! RATE_LIMIT_ADMIN_LOGIN=5/900
//! RATE_LIMIT_RESERVATION_CREATE=5/60
//! RATE_LIMIT_RESERVATION_CHECK=60/60
//!
//! # Email (sin EMAIL_API_URL los emails solo se registran en el log)
//! EMAIL_API_URL=https://api.proveedor.test/emails
//! EMAIL_API_KEY=...
//! EMAIL_FROM=reservas@restaurante.test
//! RESTAURANT_EMAIL=sala@restaurante.test
//! ```

use std::env;

use thiserror::Error;

use crate::db::rules::{parse_service_hours, ReservationRules};
use crate::email::{EmailApiConfig, MailboxConfig};
use crate::rate_limit::{RateLimitConfig, RateLimitRule};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGODB_DATABASE: &str = "pispas_bookings";
pub const DEFAULT_STATIC_DIR: &str = "./static";
pub const DEFAULT_EMAIL_FROM: &str = "reservas@localhost";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Falta la variable de entorno obligatoria {0}")]
    Missing(&'static str),

    #[error("Valor inválido para {key} ('{value}'): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Dónde viven las reservas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    MongoDb { uri: String, database: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub static_dir: String,
    pub admin_password: String,
    pub store: StoreConfig,
    pub rules: ReservationRules,
    pub rate_limit: RateLimitConfig,
    pub mailbox: MailboxConfig,
    /// `None` cuando no hay proveedor de email configurado
    pub email_api: Option<EmailApiConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de claves.
    /// Los valores vacíos cuentan como ausentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let admin_password = get("ADMIN_PASSWORD").ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?;

        let store = match get("RESERVATION_STORE").as_deref() {
            None | Some("mongodb") => StoreConfig::MongoDb {
                uri: get("MONGODB_URI").unwrap_or_else(|| DEFAULT_MONGODB_URI.to_string()),
                database: get("MONGODB_DATABASE")
                    .unwrap_or_else(|| DEFAULT_MONGODB_DATABASE.to_string()),
            },
            Some("memory") => StoreConfig::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "RESERVATION_STORE",
                    value: other.to_string(),
                    reason: "use 'mongodb' o 'memory'",
                })
            }
        };

        let mut rules = ReservationRules::default();
        if let Some(value) = get("SERVICE_HOURS") {
            rules.windows = parse_service_hours(&value).ok_or(ConfigError::Invalid {
                key: "SERVICE_HOURS",
                value,
                reason: "formato HH:MM-HH:MM separado por comas",
            })?;
        }
        if let Some(value) = get("SLOT_INTERVAL_MINUTES") {
            rules.slot_interval_minutes = parse_positive(&value)
                .ok_or(ConfigError::Invalid {
                    key: "SLOT_INTERVAL_MINUTES",
                    value,
                    reason: "debe ser un entero positivo",
                })?;
        }
        if let Some(value) = get("MAX_RESERVATIONS_PER_SLOT") {
            rules.max_reservations_per_slot = parse_positive(&value)
                .ok_or(ConfigError::Invalid {
                    key: "MAX_RESERVATIONS_PER_SLOT",
                    value,
                    reason: "debe ser un entero positivo",
                })?;
        }
        if let Some(value) = get("AUTO_CONFIRM") {
            rules.auto_confirm = parse_bool("AUTO_CONFIRM", value)?;
        }

        let mut rate_limit = RateLimitConfig::default();
        if let Some(value) = get("RATE_LIMIT_ENABLED") {
            rate_limit.enabled = parse_bool("RATE_LIMIT_ENABLED", value)?;
        }
        if let Some(value) = get("RATE_LIMIT_ADMIN_LOGIN") {
            rate_limit.admin_login = parse_rule("RATE_LIMIT_ADMIN_LOGIN", value)?;
        }
        if let Some(value) = get("RATE_LIMIT_RESERVATION_CREATE") {
            rate_limit.reservation_create = parse_rule("RATE_LIMIT_RESERVATION_CREATE", value)?;
        }
        if let Some(value) = get("RATE_LIMIT_RESERVATION_CHECK") {
            rate_limit.reservation_check = parse_rule("RATE_LIMIT_RESERVATION_CHECK", value)?;
        }

        let mailbox = MailboxConfig {
            from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            restaurant_email: get("RESTAURANT_EMAIL"),
        };

        let email_api = match get("EMAIL_API_URL") {
            Some(api_url) => Some(EmailApiConfig {
                api_url,
                api_key: get("EMAIL_API_KEY").ok_or(ConfigError::Missing("EMAIL_API_KEY"))?,
                mailbox: mailbox.clone(),
            }),
            None => None,
        };

        Ok(Self {
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            static_dir: get("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
            admin_password,
            store,
            rules,
            rate_limit,
            mailbox,
            email_api,
        })
    }
}

fn parse_positive(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v > 0)
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "debe ser true o false",
        }),
    }
}

fn parse_rule(key: &'static str, value: String) -> Result<RateLimitRule, ConfigError> {
    RateLimitRule::parse(&value).ok_or(ConfigError::Invalid {
        key,
        value,
        reason: "formato max/ventana_en_segundos, ambos positivos",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn admin_password_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("ADMIN_PASSWORD"));
        assert_eq!(
            load(&[("ADMIN_PASSWORD", "   ")]).unwrap_err(),
            ConfigError::Missing("ADMIN_PASSWORD")
        );
    }

    #[test]
    fn defaults() {
        let config = load(&[("ADMIN_PASSWORD", "s3cret")]).unwrap();

        assert_eq!(config.admin_password, "s3cret");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(
            config.store,
            StoreConfig::MongoDb {
                uri: DEFAULT_MONGODB_URI.to_string(),
                database: DEFAULT_MONGODB_DATABASE.to_string(),
            }
        );
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.admin_login, RateLimitRule::new(5, 900));
        assert_eq!(config.rules.slot_interval_minutes, 30);
        assert!(config.email_api.is_none());
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("ADMIN_PASSWORD", "s3cret"),
            ("RESERVATION_STORE", "memory"),
            ("SERVICE_HOURS", "12:00-14:00"),
            ("MAX_RESERVATIONS_PER_SLOT", "8"),
            ("AUTO_CONFIRM", "true"),
            ("RATE_LIMIT_ENABLED", "off"),
            ("RATE_LIMIT_RESERVATION_CREATE", "2/30"),
            ("EMAIL_API_URL", "http://mail.test/send"),
            ("EMAIL_API_KEY", "key"),
            ("RESTAURANT_EMAIL", "sala@restaurante.test"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.rules.windows.len(), 1);
        assert_eq!(config.rules.max_reservations_per_slot, 8);
        assert!(config.rules.auto_confirm);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.reservation_create, RateLimitRule::new(2, 30));

        let email = config.email_api.unwrap();
        assert_eq!(email.api_key, "key");
        assert_eq!(email.mailbox.restaurant_email.as_deref(), Some("sala@restaurante.test"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load(&[("ADMIN_PASSWORD", "x"), ("RESERVATION_STORE", "redis")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RESERVATION_STORE", .. }));

        let err = load(&[("ADMIN_PASSWORD", "x"), ("RATE_LIMIT_ADMIN_LOGIN", "0/10")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RATE_LIMIT_ADMIN_LOGIN", .. }));

        let err = load(&[("ADMIN_PASSWORD", "x"), ("EMAIL_API_URL", "http://mail.test")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("EMAIL_API_KEY"));
    }
}
