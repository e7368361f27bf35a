//! # Limitación de peticiones
//!
//! Cada acción protegida (`admin-login`, `reservation-create`,
//! `reservation-check`) tiene su propio limitador GCRA de `governor`,
//! indexado por el identificador del cliente. El reloj es inyectable para
//! poder avanzar el tiempo en los tests.
//!
//! ## Respuesta al superar el límite
//!
//! - `429 Too Many Requests`
//! - `Retry-After` con los segundos de espera
//! - `X-RateLimit-Limit` con el máximo configurado para la ventana
//! - `X-RateLimit-Remaining: 0`

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::HttpResponse;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::HashMapStateStore;
use governor::{Quota, RateLimiter as KeyedRateLimiter};

use crate::api::ErrorResponse;

/// Acciones sujetas a limitación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    AdminLogin,
    ReservationCreate,
    ReservationCheck,
}

impl RateLimitAction {
    pub const ALL: [RateLimitAction; 3] = [
        RateLimitAction::AdminLogin,
        RateLimitAction::ReservationCreate,
        RateLimitAction::ReservationCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminLogin => "admin-login",
            Self::ReservationCreate => "reservation-create",
            Self::ReservationCheck => "reservation-check",
        }
    }
}

impl std::fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `max_requests` peticiones por cada ventana de `window_secs` segundos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Parsea el formato `max/ventana_en_segundos`, por ejemplo `5/900`
    pub fn parse(value: &str) -> Option<Self> {
        let (max, window) = value.trim().split_once('/')?;
        let max_requests: u32 = max.trim().parse().ok()?;
        let window_secs: u64 = window.trim().parse().ok()?;
        if max_requests == 0 || window_secs == 0 {
            return None;
        }
        Some(Self::new(max_requests, window_secs))
    }

    /// Ráfaga de `max_requests` que se repone de forma uniforme durante la ventana
    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.max_requests).unwrap_or(NonZeroU32::MIN);
        let period = Duration::from_secs(self.window_secs) / burst.get();
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

/// Configuración de límites por acción
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub admin_login: RateLimitRule,
    pub reservation_create: RateLimitRule,
    pub reservation_check: RateLimitRule,
}

impl RateLimitConfig {
    pub fn rule_for(&self, action: RateLimitAction) -> RateLimitRule {
        match action {
            RateLimitAction::AdminLogin => self.admin_login,
            RateLimitAction::ReservationCreate => self.reservation_create,
            RateLimitAction::ReservationCheck => self.reservation_check,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_login: RateLimitRule::new(5, 900),
            reservation_create: RateLimitRule::new(5, 60),
            reservation_check: RateLimitRule::new(60, 60),
        }
    }
}

/// Resultado de comprobar el límite de una petición
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited {
        /// Máximo de peticiones configurado para la ventana
        limit: u32,
        retry_after_secs: u64,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Limitador inyectable indexado por (acción, cliente)
pub trait RateLimiter: Send + Sync {
    fn check(&self, action: RateLimitAction, client_id: &str) -> RateLimitResult;
}

type ClientLimiter<C> =
    KeyedRateLimiter<String, HashMapStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Limitador en memoria respaldado por `governor`
pub struct GovernorRateLimiter<C: Clock = DefaultClock> {
    config: RateLimitConfig,
    clock: C,
    limiters: HashMap<RateLimitAction, ClientLimiter<C>>,
}

impl GovernorRateLimiter<DefaultClock> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> GovernorRateLimiter<C> {
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Self {
        let limiters = RateLimitAction::ALL
            .iter()
            .map(|action| {
                let quota = config.rule_for(*action).quota();
                (*action, KeyedRateLimiter::hashmap_with_clock(quota, &clock))
            })
            .collect();

        Self {
            config,
            clock,
            limiters,
        }
    }

    /// Elimina el estado de los clientes cuya ventana ya se ha repuesto
    pub fn retain_recent(&self) {
        for limiter in self.limiters.values() {
            limiter.retain_recent();
        }
    }

    fn retry_after_secs(wait: Duration) -> u64 {
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        secs.max(1)
    }
}

impl<C> RateLimiter for GovernorRateLimiter<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send + Sync,
{
    fn check(&self, action: RateLimitAction, client_id: &str) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        let Some(limiter) = self.limiters.get(&action) else {
            return RateLimitResult::Allowed;
        };

        match limiter.check_key(&client_id.to_string()) {
            Ok(()) => RateLimitResult::Allowed,
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                RateLimitResult::Limited {
                    limit: self.config.rule_for(action).max_requests,
                    retry_after_secs: Self::retry_after_secs(wait),
                }
            }
        }
    }
}

/// Respuesta estándar `429` para una petición limitada
pub fn rate_limit_response(limit: u32, retry_after_secs: u64) -> HttpResponse {
    let mut response = HttpResponse::TooManyRequests().json(ErrorResponse {
        success: false,
        error: "Demasiadas solicitudes".to_string(),
        message: format!(
            "Has superado el límite de {} solicitudes. Inténtalo de nuevo en {} segundos.",
            limit, retry_after_secs
        ),
        details: None,
    });

    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        headers.insert(header::RETRY_AFTER, v);
    }
    if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), v);
    }
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from_static("0"),
    );

    response
}
