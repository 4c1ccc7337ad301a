//! # mailkeep-smtp
//!
//! Asynchronous SMTP client (RFC 5321) used by the mailkeep dispatcher.
//!
//! ## Features
//!
//! - **Type-state transactions**: MAIL FROM / RCPT TO / DATA ordering is
//!   enforced at compile time
//! - **Connection reuse**: finishing a transaction returns the client to the
//!   session state for the next message
//! - **TLS**: implicit TLS and STARTTLS over rustls
//! - **Authentication**: PLAIN and LOGIN
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailkeep_smtp::{Address, Client, transport};
//!
//! let conn = transport::connect("mail.example.com", 587).await?;
//! let client = Client::handshake(conn, "erp.example.com").await?;
//! let client = client.starttls("mail.example.com", "erp.example.com").await?;
//! let client = client.auth_plain("robot@example.com", "secret").await?;
//!
//! let from = Address::new("robot@example.com")?;
//! let to = Address::new("customer@example.org")?;
//!
//! let client = client
//!     .mail_from(&from)
//!     .await?
//!     .rcpt_to(&to)
//!     .await?
//!     .data()
//!     .await?
//!     .finish(b"Subject: Hi\r\n\r\nHello!\r\n")
//!     .await?;
//!
//! client.quit().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod client;
mod error;
mod reply;
pub mod transport;

pub use address::Address;
pub use client::{Client, Envelope, Rcpt, Sending, ServerCaps, Session};
pub use error::{Error, Result};
pub use reply::{Reply, ReplyCode};
pub use transport::Transport;
