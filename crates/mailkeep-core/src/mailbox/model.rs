//! Mailbox model types.

use serde::{Deserialize, Serialize};

/// Unique identifier for a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxId(pub i64);

impl MailboxId {
    /// Create a new mailbox ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MailboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user in the host application.
///
/// Users themselves are owned by the host; this library only records their
/// ids in owner and access-list positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Security/encryption mode for SMTP connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get the conventional SMTP submission port for the mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// SMTP server settings attached to a mailbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpServer {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication; empty disables authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Envelope sender used when a record carries none of its own.
    pub sender: Option<String>,
}

impl SmtpServer {
    /// Creates settings for a host with the mode's conventional port.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            ..Self::default()
        }
    }
}

/// A folder-like container for mail records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mailbox {
    /// Unique identifier (None for unsaved mailboxes).
    pub id: Option<MailboxId>,
    /// Display name.
    pub name: String,
    /// Owning user, if any.
    pub owner: Option<UserId>,
    /// Whether the folder is subscribed.
    pub subscribed: bool,
    /// SMTP server used when dispatching from this mailbox.
    pub smtp: Option<SmtpServer>,
}

impl Mailbox {
    /// Creates a new unsaved mailbox.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a new unsaved mailbox owned by a user.
    #[must_use]
    pub fn owned_by(name: impl Into<String>, owner: UserId) -> Self {
        Self {
            name: name.into(),
            owner: Some(owner),
            ..Self::default()
        }
    }
}
