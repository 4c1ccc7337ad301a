//! Mailboxes: folder-like containers with access lists, hierarchy links,
//! and optional per-mailbox SMTP server settings.

mod model;
mod repository;

pub use model::{Mailbox, MailboxId, Security, SmtpServer, UserId};
pub use repository::MailboxRepository;
