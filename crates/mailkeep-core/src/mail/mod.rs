//! Mail records: header metadata, status flags, and the digest reference
//! into the blob store.

mod model;
mod repository;
mod validation;

pub use model::{Mail, MailFlags, MailId};
pub use repository::MailRepository;
pub use validation::{ValidationError, ValidationResult, validate_mail};
