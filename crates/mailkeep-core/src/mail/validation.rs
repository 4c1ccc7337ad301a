//! Mail record address validation.

use mailkeep_smtp::Address;

use super::model::Mail;

/// Validation error for a mail record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The From header contains a malformed address.
    InvalidFrom(String),
    /// A To entry contains a malformed address.
    InvalidTo(String),
    /// A CC entry contains a malformed address.
    InvalidCc(String),
    /// A BCC entry contains a malformed address.
    InvalidBcc(String),
}

impl ValidationError {
    /// Get a human-readable error message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidFrom(addr) => format!("invalid From address: {addr}"),
            Self::InvalidTo(addr) => format!("invalid To address: {addr}"),
            Self::InvalidCc(addr) => format!("invalid CC address: {addr}"),
            Self::InvalidBcc(addr) => format!("invalid BCC address: {addr}"),
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidFrom(_) => "from",
            Self::InvalidTo(_) => "to",
            Self::InvalidCc(_) => "cc",
            Self::InvalidBcc(_) => "bcc",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a mail record.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate the address fields of a mail record.
///
/// Empty fields pass; every non-empty comma-separated entry must parse as
/// an address (bare or `Name <addr>` display form).
///
/// # Errors
///
/// Returns every violation found across the four address fields.
pub fn validate_mail(mail: &Mail) -> ValidationResult {
    let mut errors = Vec::new();

    check_list(&mail.from_, ValidationError::InvalidFrom, &mut errors);
    check_list(&mail.to, ValidationError::InvalidTo, &mut errors);
    check_list(&mail.cc, ValidationError::InvalidCc, &mut errors);
    check_list(&mail.bcc, ValidationError::InvalidBcc, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_list(
    list: &str,
    make_error: impl Fn(String) -> ValidationError,
    errors: &mut Vec<ValidationError>,
) {
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if Address::parse(entry).is_err() {
            errors.push(make_error(entry.to_string()));
        }
    }
}
