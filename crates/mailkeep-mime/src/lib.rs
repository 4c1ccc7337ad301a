//! # mailkeep-mime
//!
//! MIME message parsing and decoding for the mailkeep archive.
//!
//! ## Features
//!
//! - **Message parsing**: RFC 5322 header blocks with unfolding, multipart
//!   splitting with nested multipart support
//! - **Header decoding**: RFC 2047 encoded words (B and Q), lenient on
//!   malformed input
//! - **Transfer decoding**: Base64 and Quoted-Printable
//! - **Content extraction**: plain/HTML body selection and attachment
//!   collection from the part tree
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailkeep_mime::{Message, extract_content};
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: =?utf-8?B?SMOpbGxv?=\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! println!("Subject: {}", message.subject().unwrap_or_default());
//!
//! let content = extract_content(&message)?;
//! println!("Body: {}", content.text.unwrap_or_default());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content::{Attachment, MailContent, extract_content};
pub use content_type::{ContentDisposition, ContentType, DispositionKind};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding, split_multipart};
