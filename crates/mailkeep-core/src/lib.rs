//! # mailkeep-core
//!
//! Storage, parsing, and dispatch layer for electronic mail records inside
//! a larger business application.
//!
//! This crate provides:
//! - **Mailboxes** - folder containers with owner, read/write access lists,
//!   hierarchy links, and optional per-mailbox SMTP server settings
//! - **Mail records** - header metadata, status flags, and a digest
//!   reference into the blob store
//! - **Blob store** - content-addressed storage of raw messages with
//!   digest dedup and linear collision-chain probing
//! - **Defaults** - per-company sent/draft/error/outbox assignments
//! - **Services** - archiving raw messages and dispatching queued mail
//!   over SMTP
//!
//! The host application owns users, companies, and scheduling; its cron
//! drives [`service::dispatch_queued`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod db;
pub mod defaults;
mod error;
pub mod mail;
pub mod mailbox;
pub mod service;
pub mod store;

pub use db::Database;
pub use defaults::{CompanyId, DefaultsRepository, MailboxDefaults};
pub use error::{Error, Result};
pub use mail::{Mail, MailFlags, MailId, MailRepository, ValidationError, validate_mail};
pub use mailbox::{Mailbox, MailboxId, MailboxRepository, Security, SmtpServer, UserId};
pub use service::{
    DispatchReport, MAX_SEND_ATTEMPTS, archive_message, dispatch_queued, fetch_original,
    mail_content,
};
pub use store::{BlobRef, BlobStore};
