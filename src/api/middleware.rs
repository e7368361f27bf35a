//! # Utilidades de logging para errores
//!
//! Registra la cadena completa de `source()` de un error con `tracing`.

use std::error::Error as StdError;

fn error_chain<E>(error: &E) -> Vec<String>
where
    E: StdError + 'static,
{
    let mut chain = Vec::new();
    let mut current_error: Option<&dyn StdError> = Some(error);

    while let Some(err) = current_error {
        chain.push(err.to_string());
        current_error = err.source();
    }

    chain
}

/// Registra la cadena completa de errores a nivel `error`
///
/// # Ejemplo
/// ```rust,ignore
/// if let Err(e) = repo.create_indexes().await {
///     log_error_chain(&e, Some("creating indexes"));
/// }
/// ```
pub fn log_error_chain<E>(error: &E, context: Option<&str>)
where
    E: StdError + 'static,
{
    let error_chain = error_chain(error);

    if let Some(ctx) = context {
        tracing::error!(
            context = %ctx,
            error_chain = ?error_chain,
            "Error with full chain (with context)"
        );
    } else {
        tracing::error!(error_chain = ?error_chain, "Error with full chain");
    }
}

/// Extension trait para Results que añade logging automático de error chains
///
/// # Ejemplo de uso
/// ```rust,ignore
/// state.emails
///     .send_reservation_emails(&reservation)
///     .await
///     .log_warn_context("sending reservation emails")
///     .ok();
/// ```
pub trait ErrorLogExt<T, E> {
    /// Registra la cadena de errores a nivel `warn`, para fallos tolerados
    fn log_warn_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_warn_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            tracing::warn!(
                context = %context,
                error_chain = ?error_chain(error),
                "Warning with error chain"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn chain_follows_sources() {
        let error = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner"));
        assert_eq!(error_chain(&error), vec!["outer".to_string(), "inner".to_string()]);
    }

    #[test]
    fn warn_context_passes_result_through() {
        let failed: Result<(), Outer> =
            Err(Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner")));
        assert!(failed.log_warn_context("test").is_err());

        let ok: Result<u8, Outer> = Ok(7);
        assert_eq!(ok.log_warn_context("test").ok(), Some(7));
    }
}
