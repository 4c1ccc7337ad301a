//! Error types for the core library.

use crate::mail::ValidationError;
use crate::mailbox::MailboxId;
use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error (blob store).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MIME parsing failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailkeep_mime::Error),

    /// SMTP operation failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mailkeep_smtp::Error),

    /// A mail record failed address validation.
    #[error("Invalid mail record: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Mailbox still contains mail records.
    #[error("Mailbox {0} still contains mail and cannot be deleted")]
    MailboxNotEmpty(MailboxId),

    /// A mail record has no usable envelope.
    #[error("Mail record has no usable envelope: {0}")]
    BadEnvelope(String),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
