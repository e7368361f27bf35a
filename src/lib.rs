//! # Pispas Bookings
//!
//! API web de reservas para restaurantes construida con Actix Web.
//!
//! ## Módulos
//!
//! - [`api`] - Rutas HTTP: login de administración y reservas
//! - [`config`] - Configuración desde variables de entorno
//! - [`db`] - Servicio de reservas (MongoDB o memoria) y reglas de horarios
//! - [`email`] - Envío de emails de confirmación
//! - [`rate_limit`] - Limitación de peticiones por acción y cliente
//! - [`validation`] - Validación de esquemas de los cuerpos JSON

pub mod api;
pub mod config;
pub mod db;
pub mod email;
pub mod rate_limit;
pub mod validation;
