//! # Emails de reserva
//!
//! Tras crear una reserva se envían dos mensajes: la confirmación al cliente y
//! el aviso al restaurante. El envío es de mejor esfuerzo: quien llama registra
//! el error pero no falla la petición.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::db::{Reservation, ReservationStatus};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Error HTTP enviando email: {0}")]
    Http(#[from] reqwest::Error),

    #[error("El proveedor de email rechazó el mensaje a '{to}' (HTTP {status}): {body}")]
    Rejected { to: String, status: u16, body: String },

    #[error("Fallaron {} envíos de email: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<EmailError>),
}

fn join_errors(errors: &[EmailError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_reservation_emails(&self, reservation: &Reservation) -> Result<(), EmailError>;
}

/// Mensaje tal como lo espera la API del proveedor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Remitente y destinatario interno de los avisos
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub from: String,
    /// Sin dirección del restaurante solo se envía la confirmación al cliente
    pub restaurant_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmailApiConfig {
    pub api_url: String,
    pub api_key: String,
    pub mailbox: MailboxConfig,
}

/// Construye los mensajes de una reserva recién creada
pub fn reservation_messages(reservation: &Reservation, mailbox: &MailboxConfig) -> Vec<EmailMessage> {
    let date = reservation.reservation_date.format("%d/%m/%Y").to_string();
    let time = reservation.time_label();
    let state = match reservation.status {
        ReservationStatus::Confirmed => "confirmada",
        ReservationStatus::Pending => "pendiente de confirmación",
        ReservationStatus::Cancelled => "cancelada",
    };

    let mut messages = vec![EmailMessage {
        from: mailbox.from.clone(),
        to: reservation.email.clone(),
        subject: format!("Tu reserva para el {} a las {}", date, time),
        text: format!(
            "Hola {},\n\nHemos recibido tu reserva para {} personas el {} a las {}.\n\
             Estado: {}.\nReferencia: {}\n",
            reservation.name, reservation.party_size, date, time, state, reservation.id
        ),
    }];

    if let Some(restaurant) = &mailbox.restaurant_email {
        let mut text = format!(
            "Nueva reserva {}\n\nNombre: {}\nEmail: {}\nTeléfono: {}\nPersonas: {}\nFecha: {} {}\n",
            reservation.id,
            reservation.name,
            reservation.email,
            reservation.phone.as_deref().unwrap_or("-"),
            reservation.party_size,
            date,
            time
        );
        if let Some(requests) = &reservation.special_requests {
            text.push_str(&format!("Peticiones: {}\n", requests));
        }

        messages.push(EmailMessage {
            from: mailbox.from.clone(),
            to: restaurant.clone(),
            subject: format!("Nueva reserva: {} ({} pax) {} {}", reservation.name, reservation.party_size, date, time),
            text,
        });
    }

    messages
}

/// Envío mediante una API HTTP de email transaccional
#[derive(Debug, Clone)]
pub struct HttpEmailService {
    client: reqwest::Client,
    config: EmailApiConfig,
}

impl HttpEmailService {
    pub fn new(config: EmailApiConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %message.to, "Email enviado");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EmailError::Rejected {
            to: message.to.clone(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl EmailService for HttpEmailService {
    /// Intenta todos los mensajes aunque alguno falle; el error agrupa los fallos
    async fn send_reservation_emails(&self, reservation: &Reservation) -> Result<(), EmailError> {
        let mut failures = Vec::new();
        for message in reservation_messages(reservation, &self.config.mailbox) {
            if let Err(error) = self.send(&message).await {
                failures.push(error);
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(EmailError::Multiple(failures)),
        }
    }
}

/// Sustituto cuando no hay proveedor configurado: solo deja constancia en el log
#[derive(Debug, Clone)]
pub struct LogEmailService {
    mailbox: MailboxConfig,
}

impl LogEmailService {
    pub fn new(mailbox: MailboxConfig) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl EmailService for LogEmailService {
    async fn send_reservation_emails(&self, reservation: &Reservation) -> Result<(), EmailError> {
        for message in reservation_messages(reservation, &self.mailbox) {
            tracing::info!(
                to = %message.to,
                subject = %message.subject,
                "Email no enviado (sin proveedor configurado)"
            );
        }
        Ok(())
    }
}
