//! Services tying the repositories, the blob store, and the SMTP client
//! together: archiving raw messages and dispatching queued mail.

pub mod archive;
pub mod dispatch;

pub use archive::{archive_message, fetch_original, mail_content};
pub use dispatch::{DispatchReport, MAX_SEND_ATTEMPTS, dispatch_outbox, dispatch_queued};
