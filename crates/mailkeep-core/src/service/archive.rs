//! Archiving raw messages into the store and the mail table.

use mailkeep_mime::{MailContent, Message, extract_content};
use tracing::info;

use crate::Database;
use crate::Result;
use crate::mail::Mail;
use crate::mailbox::MailboxId;
use crate::store::BlobStore;

/// Archives a raw RFC 5322 message into a mailbox.
///
/// The raw bytes are parsed for metadata (decoded subject, addresses,
/// date, message ids), deduplicated into the blob store, and persisted as
/// a mail record carrying the digest/collision reference and the byte
/// size.
///
/// # Errors
///
/// Returns an error if parsing fails, the blob store write fails, or the
/// record cannot be saved (including address validation).
pub async fn archive_message(
    db: &Database,
    store: &BlobStore,
    mailbox: MailboxId,
    raw: &[u8],
) -> Result<Mail> {
    let parsed = Message::parse(raw)?;
    let blob = store.put(raw).await?;

    let mut mail = Mail::new(mailbox);
    mail.from_ = parsed.from().unwrap_or_default().to_string();
    mail.sender = parsed.sender().unwrap_or_default().to_string();
    mail.to = parsed.to().unwrap_or_default().to_string();
    mail.cc = parsed.cc().unwrap_or_default().to_string();
    mail.bcc = parsed.bcc().unwrap_or_default().to_string();
    mail.subject = parsed.subject().unwrap_or_default();
    mail.date = parsed.date();
    mail.message_id = parsed.message_id().unwrap_or_default().to_string();
    mail.in_reply_to = parsed.in_reply_to().unwrap_or_default().to_string();
    mail.digest = Some(blob.digest.clone());
    mail.collision = i64::from(blob.collision);
    mail.size = i64::try_from(raw.len()).unwrap_or(i64::MAX);

    db.mails().save(&mut mail).await?;
    info!(mail = %mail.display_name(), blob = %blob, "archived message");
    Ok(mail)
}

/// Reads the raw message of a record back from the blob store.
///
/// Returns `None` when the record has no blob reference yet or the slot
/// is missing from the filesystem.
///
/// # Errors
///
/// Returns an error if the filesystem read fails.
pub async fn fetch_original(store: &BlobStore, mail: &Mail) -> Result<Option<Vec<u8>>> {
    match mail.blob_ref() {
        Some(blob) => store.get(&blob).await,
        None => Ok(None),
    }
}

/// Fetches, parses, and walks a record's raw message.
///
/// Returns `None` when no raw message is stored.
///
/// # Errors
///
/// Returns an error if the read, the parse, or the content walk fails.
pub async fn mail_content(store: &BlobStore, mail: &Mail) -> Result<Option<MailContent>> {
    let Some(raw) = fetch_original(store, mail).await? else {
        return Ok(None);
    };
    let parsed = Message::parse(&raw)?;
    Ok(Some(extract_content(&parsed)?))
}
