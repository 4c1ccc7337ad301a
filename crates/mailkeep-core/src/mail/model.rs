//! Mail record model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mailbox::MailboxId;
use crate::store::BlobRef;

/// Unique identifier for a mail record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailId(pub i64);

impl MailId {
    /// Create a new mail ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IMAP-style status flags, plus the sent marker set by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailFlags {
    /// Message has been read.
    pub seen: bool,
    /// Message has been answered.
    pub answered: bool,
    /// Message is flagged for attention.
    pub flagged: bool,
    /// Message is an unfinished draft.
    pub draft: bool,
    /// Message recently arrived.
    pub recent: bool,
    /// Message was delivered by the dispatcher.
    pub sent: bool,
}

/// A stored mail record.
///
/// The raw message itself lives in the blob store; the record carries the
/// metadata extracted at archive time plus the `digest`/`collision` pair
/// locating the raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mail {
    /// Unique identifier (None for unsaved records).
    pub id: Option<MailId>,
    /// Mailbox containing this record.
    pub mailbox: MailboxId,
    /// From header.
    pub from_: String,
    /// Sender header (envelope sender when it differs from From).
    pub sender: String,
    /// To recipients, comma-separated.
    pub to: String,
    /// CC recipients, comma-separated.
    pub cc: String,
    /// BCC recipients, comma-separated.
    pub bcc: String,
    /// Subject with RFC 2047 words decoded.
    pub subject: String,
    /// Date header, normalized to UTC.
    pub date: Option<DateTime<Utc>>,
    /// Message-ID header.
    pub message_id: String,
    /// In-Reply-To header.
    pub in_reply_to: String,
    /// MD5 digest of the raw message, once stored.
    pub digest: Option<String>,
    /// Collision index distinguishing same-digest blobs.
    pub collision: i64,
    /// Raw message size in bytes.
    pub size: i64,
    /// Status flags.
    pub flags: MailFlags,
    /// Delivery attempts made by the dispatcher.
    pub attempts: i64,
}

impl Mail {
    /// Creates an empty unsaved record in a mailbox.
    #[must_use]
    pub fn new(mailbox: MailboxId) -> Self {
        Self {
            id: None,
            mailbox,
            from_: String::new(),
            sender: String::new(),
            to: String::new(),
            cc: String::new(),
            bcc: String::new(),
            subject: String::new(),
            date: None,
            message_id: String::new(),
            in_reply_to: String::new(),
            digest: None,
            collision: 0,
            size: 0,
            flags: MailFlags::default(),
            attempts: 0,
        }
    }

    /// Record name shown in list views: `subject (ID: n)`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.id {
            Some(id) => format!("{} (ID: {id})", self.subject),
            None => self.subject.clone(),
        }
    }

    /// Reference into the blob store, once the raw message was stored.
    #[must_use]
    pub fn blob_ref(&self) -> Option<BlobRef> {
        self.digest.as_ref().map(|digest| BlobRef {
            digest: digest.clone(),
            collision: u32::try_from(self.collision).unwrap_or(0),
        })
    }

    /// The address to use as SMTP envelope sender: the Sender header when
    /// set, otherwise From. Empty strings count as unset.
    #[must_use]
    pub fn envelope_sender(&self) -> Option<&str> {
        if !self.sender.trim().is_empty() {
            return Some(self.sender.trim());
        }
        let from = self.from_.trim();
        if from.is_empty() { None } else { Some(from) }
    }

    /// Every recipient entry from To, CC, and BCC, comma-split and trimmed.
    #[must_use]
    pub fn recipient_entries(&self) -> Vec<&str> {
        [&self.to, &self.cc, &self.bcc]
            .into_iter()
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let mail = Mail::new(MailboxId::new(1));
        assert!(mail.id.is_none());
        assert_eq!(mail.collision, 0);
        assert_eq!(mail.attempts, 0);
        assert_eq!(mail.flags, MailFlags::default());
        assert!(mail.blob_ref().is_none());
    }

    #[test]
    fn display_name_includes_id() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.subject = "Quarterly report".to_string();
        mail.id = Some(MailId::new(12));
        assert_eq!(mail.display_name(), "Quarterly report (ID: 12)");
    }

    #[test]
    fn blob_ref_from_digest() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.digest = Some("d41d8cd98f00b204e9800998ecf8427e".to_string());
        mail.collision = 2;

        let blob = mail.blob_ref().unwrap();
        assert_eq!(blob.digest, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(blob.collision, 2);
    }

    #[test]
    fn envelope_sender_prefers_sender_header() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.from_ = "from@example.com".to_string();
        mail.sender = "sender@example.com".to_string();
        assert_eq!(mail.envelope_sender(), Some("sender@example.com"));

        mail.sender.clear();
        assert_eq!(mail.envelope_sender(), Some("from@example.com"));

        mail.from_.clear();
        assert_eq!(mail.envelope_sender(), None);
    }

    #[test]
    fn recipient_entries_merges_lists() {
        let mut mail = Mail::new(MailboxId::new(1));
        mail.to = "a@example.com, b@example.com".to_string();
        mail.cc = "c@example.com".to_string();
        mail.bcc = " ".to_string();

        assert_eq!(
            mail.recipient_entries(),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }
}
