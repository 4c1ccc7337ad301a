//! End-to-end archive flow: raw bytes in, metadata + blob out.

#![allow(clippy::unwrap_used)]

use mailkeep_core::{BlobStore, Database, Mailbox, archive_message, fetch_original, mail_content};

const RAW: &[u8] = b"From: Jane Doe <jane@example.com>\r\n\
To: john@example.org\r\n\
Cc: team@example.org\r\n\
Subject: =?utf-8?Q?Caf=C3=A9_minutes?=\r\n\
Date: Tue, 1 Jul 2025 10:30:00 +0200\r\n\
Message-ID: <minutes-1@example.com>\r\n\
In-Reply-To: <agenda-9@example.com>\r\n\
Content-Type: multipart/mixed; boundary=edge\r\n\
\r\n\
--edge\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Minutes attached.\r\n\
--edge\r\n\
Content-Type: application/pdf\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Disposition: attachment; filename=\"minutes.pdf\"\r\n\
\r\n\
JVBERg==\r\n\
--edge--\r\n";

#[tokio::test]
async fn archive_extracts_metadata_and_stores_blob() {
    let db = Database::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let mut inbox = Mailbox::new("Inbox");
    db.mailboxes().save(&mut inbox).await.unwrap();

    let mail = archive_message(&db, &store, inbox.id.unwrap(), RAW)
        .await
        .unwrap();

    assert_eq!(mail.from_, "Jane Doe <jane@example.com>");
    assert_eq!(mail.to, "john@example.org");
    assert_eq!(mail.cc, "team@example.org");
    assert_eq!(mail.subject, "Café minutes");
    assert_eq!(mail.message_id, "<minutes-1@example.com>");
    assert_eq!(mail.in_reply_to, "<agenda-9@example.com>");
    assert_eq!(mail.date.unwrap().to_rfc3339(), "2025-07-01T08:30:00+00:00");
    assert_eq!(mail.size, i64::try_from(RAW.len()).unwrap());
    assert_eq!(mail.collision, 0);
    assert_eq!(mail.digest.as_deref(), Some(BlobStore::digest(RAW).as_str()));

    // The record is queryable again
    let loaded = db.mails().get(mail.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.subject, "Café minutes");
}

#[tokio::test]
async fn archived_message_reads_back_verbatim() {
    let db = Database::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let mut inbox = Mailbox::new("Inbox");
    db.mailboxes().save(&mut inbox).await.unwrap();

    let mail = archive_message(&db, &store, inbox.id.unwrap(), RAW)
        .await
        .unwrap();

    let raw = fetch_original(&store, &mail).await.unwrap().unwrap();
    assert_eq!(raw, RAW);
}

#[tokio::test]
async fn archived_message_content_walk() {
    let db = Database::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let mut inbox = Mailbox::new("Inbox");
    db.mailboxes().save(&mut inbox).await.unwrap();

    let mail = archive_message(&db, &store, inbox.id.unwrap(), RAW)
        .await
        .unwrap();

    let content = mail_content(&store, &mail).await.unwrap().unwrap();
    assert_eq!(content.text.as_deref(), Some("Minutes attached."));
    assert_eq!(content.attachments.len(), 1);
    assert_eq!(content.attachments[0].filename.as_deref(), Some("minutes.pdf"));
    assert_eq!(content.attachments[0].data, b"%PDF");
}

#[tokio::test]
async fn archiving_twice_deduplicates_the_blob() {
    let db = Database::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let mut inbox = Mailbox::new("Inbox");
    let mut archive = Mailbox::new("Archive");
    db.mailboxes().save(&mut inbox).await.unwrap();
    db.mailboxes().save(&mut archive).await.unwrap();

    let first = archive_message(&db, &store, inbox.id.unwrap(), RAW)
        .await
        .unwrap();
    let second = archive_message(&db, &store, archive.id.unwrap(), RAW)
        .await
        .unwrap();

    assert_eq!(first.digest, second.digest);
    assert_eq!(second.collision, 0);
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn unsaved_record_has_no_content() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let mail = mailkeep_core::Mail::new(mailkeep_core::MailboxId::new(1));
    assert!(fetch_original(&store, &mail).await.unwrap().is_none());
    assert!(mail_content(&store, &mail).await.unwrap().is_none());
}
