//! # Pispas Bookings Server
//!
//! Servidor web de reservas para restaurantes construido con Rust y Actix Web.
//!
//! ## Características principales
//!
//! - **Login de administración**: contraseña configurada y cookie de sesión
//! - **Reservas**: creación con comprobación de disponibilidad y emails
//! - **Disponibilidad**: franjas libres por fecha
//! - **Rate limiting**: límites por acción y dirección de cliente
//!
//! ## Configuración
//!
//! Ver [`pispas_bookings::config`] para todas las variables de entorno. La única
//! obligatoria es `ADMIN_PASSWORD`.
//!
//! ## Ejecución
//!
//! ```bash
//! # Con MongoDB local
//! ADMIN_PASSWORD=cambia-esto cargo run
//!
//! # Sin base de datos (reservas en memoria)
//! ADMIN_PASSWORD=cambia-esto RESERVATION_STORE=memory cargo run
//! ```
//!
//! ## Arquitectura
//!
//! ```text
//! Frontend (HTML/CSS/JS)
//!     ↓ HTTP/JSON
//! API REST (Actix Web) → rate limiter
//!     ↓
//! Servicio de reservas (MongoDB | memoria)   Servicio de email (API HTTP | log)
//! ```

use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};

use pispas_bookings::api::{self, AdminCredentials, AppState};
use pispas_bookings::config::{AppConfig, StoreConfig};
use pispas_bookings::db::{InMemoryReservationService, MongoRepo, ReservationService};
use pispas_bookings::email::{EmailService, HttpEmailService, LogEmailService};
use pispas_bookings::rate_limit::{GovernorRateLimiter, RateLimiter};

/// Cada cuánto se purga el estado de clientes inactivos del rate limiter
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn startup_error(context: &str, error: impl std::fmt::Display) -> std::io::Error {
    tracing::error!("{}: {}", context, error);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, error))
}

/// Función principal que inicia el servidor web
///
/// 1. Carga variables de entorno desde `.env`
/// 2. Configura el sistema de logging con tracing
/// 3. Lee y valida la configuración (falla sin `ADMIN_PASSWORD`)
/// 4. Inicializa el servicio de reservas, el de email y el rate limiter
/// 5. Arranca el servidor HTTP con las rutas de la API y los estáticos
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Configurar sistema de logging con tracing
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["pispas_bookings=debug", "mongodb=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Iniciando Pispas Bookings Server...");

    let config = AppConfig::from_env().map_err(|e| startup_error("Configuración inválida", e))?;

    let reservations: Arc<dyn ReservationService> = match &config.store {
        StoreConfig::MongoDb { uri, database } => {
            let repo = MongoRepo::init(uri, database, config.rules.clone())
                .await
                .map_err(|e| startup_error("Error conectando a MongoDB", e))?;

            // Sin índices no hay detección de duplicados concurrentes, pero se puede servir
            if let Err(e) = repo.create_indexes().await {
                tracing::warn!("Advertencia creando índices: {}", e);
            }

            Arc::new(repo)
        }
        StoreConfig::Memory => {
            tracing::warn!("Reservas en memoria: se perderán al reiniciar");
            Arc::new(InMemoryReservationService::new(config.rules.clone()))
        }
    };

    let emails: Arc<dyn EmailService> = match &config.email_api {
        Some(email_api) => Arc::new(
            HttpEmailService::new(email_api.clone())
                .map_err(|e| startup_error("Error creando cliente de email", e))?,
        ),
        None => {
            tracing::warn!("EMAIL_API_URL no configurado: los emails solo se registrarán en el log");
            Arc::new(LogEmailService::new(config.mailbox.clone()))
        }
    };

    let rate_limiter = Arc::new(GovernorRateLimiter::new(config.rate_limit.clone()));
    let pruned = Arc::clone(&rate_limiter);
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            pruned.retain_recent();
        }
    });

    let state = AppState::new(
        AdminCredentials::new(&config.admin_password),
        rate_limiter as Arc<dyn RateLimiter>,
        reservations,
        emails,
    );

    let bind_address = config.bind_address.clone();
    let static_dir = config.static_dir.clone();

    tracing::info!("Servidor iniciando en {}", bind_address);

    // Crear y configurar el servidor HTTP
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(api::init_routes)
            .service(Files::new("/static", &static_dir).index_file("index.html"))
            .route("/", web::get().to(|| async {
                actix_web::HttpResponse::PermanentRedirect()
                    .append_header(("Location", "/static/index.html"))
                    .finish()
            }))
    })
        .bind(&bind_address)?
        .run()
        .await
}
