//! Per-company default mailbox assignments.

mod model;
mod repository;

pub use model::{CompanyId, MailboxDefaults};
pub use repository::DefaultsRepository;
