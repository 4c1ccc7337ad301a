//! Mail record storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{Mail, MailFlags, MailId};
use super::validation::validate_mail;
use crate::mailbox::{MailboxId, UserId};
use crate::store::BlobRef;
use crate::{Error, Result};

const MAIL_COLUMNS: &str = r"
    id, mailbox, from_addr, sender, to_addrs, cc_addrs, bcc_addrs,
    subject, date, message_id, in_reply_to,
    digest, collision, size,
    flag_seen, flag_answered, flag_flagged, flag_draft, flag_recent, flag_sent,
    attempts
";

/// Repository for mail record storage and retrieval.
pub struct MailRepository {
    pool: SqlitePool,
}

impl MailRepository {
    /// Creates a repository over an open pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the mail record schema.
    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mailbox INTEGER NOT NULL,
                from_addr TEXT NOT NULL DEFAULT '',
                sender TEXT NOT NULL DEFAULT '',
                to_addrs TEXT NOT NULL DEFAULT '',
                cc_addrs TEXT NOT NULL DEFAULT '',
                bcc_addrs TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                date TEXT,
                message_id TEXT NOT NULL DEFAULT '',
                in_reply_to TEXT NOT NULL DEFAULT '',
                digest TEXT,
                collision INTEGER NOT NULL DEFAULT 0,
                size INTEGER NOT NULL DEFAULT 0,
                flag_seen INTEGER NOT NULL DEFAULT 0,
                flag_answered INTEGER NOT NULL DEFAULT 0,
                flag_flagged INTEGER NOT NULL DEFAULT 0,
                flag_draft INTEGER NOT NULL DEFAULT 0,
                flag_recent INTEGER NOT NULL DEFAULT 0,
                flag_sent INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS idx_mails_mailbox ON mails(mailbox)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS idx_mails_queue ON mails(mailbox, flag_sent)",
        )
        .execute(pool)
        .await?;

        sqlx::query(r"CREATE INDEX IF NOT EXISTS idx_mails_digest ON mails(digest)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Save a mail record (insert or update).
    ///
    /// Address fields are validated first; a record with malformed
    /// addresses is refused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on malformed addresses, or an error if
    /// the database query fails.
    pub async fn save(&self, mail: &mut Mail) -> Result<()> {
        if let Err(errors) = validate_mail(mail) {
            return Err(Error::Validation(errors));
        }

        let date = mail.date.map(|d| d.to_rfc3339());

        if let Some(id) = mail.id {
            sqlx::query(
                r"
                UPDATE mails SET
                    mailbox = ?, from_addr = ?, sender = ?,
                    to_addrs = ?, cc_addrs = ?, bcc_addrs = ?,
                    subject = ?, date = ?, message_id = ?, in_reply_to = ?,
                    digest = ?, collision = ?, size = ?,
                    flag_seen = ?, flag_answered = ?, flag_flagged = ?,
                    flag_draft = ?, flag_recent = ?, flag_sent = ?,
                    attempts = ?
                WHERE id = ?
                ",
            )
            .bind(mail.mailbox.0)
            .bind(&mail.from_)
            .bind(&mail.sender)
            .bind(&mail.to)
            .bind(&mail.cc)
            .bind(&mail.bcc)
            .bind(&mail.subject)
            .bind(date)
            .bind(&mail.message_id)
            .bind(&mail.in_reply_to)
            .bind(&mail.digest)
            .bind(mail.collision)
            .bind(mail.size)
            .bind(mail.flags.seen)
            .bind(mail.flags.answered)
            .bind(mail.flags.flagged)
            .bind(mail.flags.draft)
            .bind(mail.flags.recent)
            .bind(mail.flags.sent)
            .bind(mail.attempts)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO mails (
                    mailbox, from_addr, sender, to_addrs, cc_addrs, bcc_addrs,
                    subject, date, message_id, in_reply_to,
                    digest, collision, size,
                    flag_seen, flag_answered, flag_flagged,
                    flag_draft, flag_recent, flag_sent,
                    attempts
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(mail.mailbox.0)
            .bind(&mail.from_)
            .bind(&mail.sender)
            .bind(&mail.to)
            .bind(&mail.cc)
            .bind(&mail.bcc)
            .bind(&mail.subject)
            .bind(date)
            .bind(&mail.message_id)
            .bind(&mail.in_reply_to)
            .bind(&mail.digest)
            .bind(mail.collision)
            .bind(mail.size)
            .bind(mail.flags.seen)
            .bind(mail.flags.answered)
            .bind(mail.flags.flagged)
            .bind(mail.flags.draft)
            .bind(mail.flags.recent)
            .bind(mail.flags.sent)
            .bind(mail.attempts)
            .execute(&self.pool)
            .await?;

            mail.id = Some(MailId::new(result.last_insert_rowid()));
            debug!(mail = %mail.display_name(), "created mail record");
        }

        Ok(())
    }

    /// Get a mail record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: MailId) -> Result<Option<Mail>> {
        let row = sqlx::query(&format!("SELECT {MAIL_COLUMNS} FROM mails WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_mail))
    }

    /// Delete a mail record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: MailId) -> Result<()> {
        sqlx::query("DELETE FROM mails WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records in a mailbox, newest date first (the list-view order).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_mailbox(&self, mailbox: MailboxId) -> Result<Vec<Mail>> {
        let rows = sqlx::query(&format!(
            "SELECT {MAIL_COLUMNS} FROM mails WHERE mailbox = ? ORDER BY date DESC, id DESC"
        ))
        .bind(mailbox.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mail).collect())
    }

    /// Unsent records of a mailbox in queue order (oldest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn queued(&self, mailbox: MailboxId) -> Result<Vec<Mail>> {
        let rows = sqlx::query(&format!(
            "SELECT {MAIL_COLUMNS} FROM mails WHERE mailbox = ? AND flag_sent = 0 ORDER BY id ASC"
        ))
        .bind(mailbox.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mail).collect())
    }

    /// Number of records in a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_in_mailbox(&self, mailbox: MailboxId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM mails WHERE mailbox = ?")
            .bind(mailbox.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// Move a record into another mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn move_to_mailbox(&self, id: MailId, mailbox: MailboxId) -> Result<()> {
        sqlx::query("UPDATE mails SET mailbox = ? WHERE id = ?")
            .bind(mailbox.0)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update the status flags of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_flags(&self, id: MailId, flags: MailFlags) -> Result<()> {
        sqlx::query(
            r"
            UPDATE mails SET
                flag_seen = ?, flag_answered = ?, flag_flagged = ?,
                flag_draft = ?, flag_recent = ?, flag_sent = ?
            WHERE id = ?
            ",
        )
        .bind(flags.seen)
        .bind(flags.answered)
        .bind(flags.flagged)
        .bind(flags.draft)
        .bind(flags.recent)
        .bind(flags.sent)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a record as sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_sent(&self, id: MailId) -> Result<()> {
        sqlx::query("UPDATE mails SET flag_sent = 1 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Increment the delivery attempt counter and return the new count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record_attempt(&self, id: MailId) -> Result<i64> {
        sqlx::query("UPDATE mails SET attempts = attempts + 1 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT attempts FROM mails WHERE id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("attempts"))
    }

    /// Record where the raw message was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_blob(&self, id: MailId, blob: &BlobRef, size: i64) -> Result<()> {
        sqlx::query("UPDATE mails SET digest = ?, collision = ?, size = ? WHERE id = ?")
            .bind(&blob.digest)
            .bind(i64::from(blob.collision))
            .bind(size)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Owner of the mailbox containing a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn owner_of(&self, id: MailId) -> Result<Option<UserId>> {
        let row = sqlx::query(
            r"
            SELECT m.owner AS owner
            FROM mails r JOIN mailboxes m ON r.mailbox = m.id
            WHERE r.id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| row.get::<Option<i64>, _>("owner").map(UserId)))
    }

    /// Records the user may read: mailbox owner or on either access list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn readable_by(&self, user: UserId) -> Result<Vec<Mail>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MAIL_COLUMNS} FROM mails
            WHERE mailbox IN (
                SELECT id FROM mailboxes WHERE owner = ?
                UNION SELECT mailbox FROM mailbox_read_users WHERE user_id = ?
                UNION SELECT mailbox FROM mailbox_write_users WHERE user_id = ?
            )
            ORDER BY date DESC, id DESC
            "
        ))
        .bind(user.0)
        .bind(user.0)
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mail).collect())
    }
}

fn row_to_mail(row: &SqliteRow) -> Mail {
    let date = row.get::<Option<String>, _>("date").and_then(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    });

    Mail {
        id: Some(MailId::new(row.get("id"))),
        mailbox: MailboxId::new(row.get("mailbox")),
        from_: row.get("from_addr"),
        sender: row.get("sender"),
        to: row.get("to_addrs"),
        cc: row.get("cc_addrs"),
        bcc: row.get("bcc_addrs"),
        subject: row.get("subject"),
        date,
        message_id: row.get("message_id"),
        in_reply_to: row.get("in_reply_to"),
        digest: row.get("digest"),
        collision: row.get("collision"),
        size: row.get("size"),
        flags: MailFlags {
            seen: row.get::<i64, _>("flag_seen") != 0,
            answered: row.get::<i64, _>("flag_answered") != 0,
            flagged: row.get::<i64, _>("flag_flagged") != 0,
            draft: row.get::<i64, _>("flag_draft") != 0,
            recent: row.get::<i64, _>("flag_recent") != 0,
            sent: row.get::<i64, _>("flag_sent") != 0,
        },
        attempts: row.get("attempts"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::mailbox::Mailbox;
    use chrono::TimeZone;

    async fn mailbox(db: &Database, name: &str) -> MailboxId {
        let mut mailbox = Mailbox::new(name);
        db.mailboxes().save(&mut mailbox).await.unwrap();
        mailbox.id.unwrap()
    }

    #[tokio::test]
    async fn save_and_retrieve_record() {
        let db = Database::in_memory().await.unwrap();
        let inbox = mailbox(&db, "Inbox").await;
        let repo = db.mails();

        let mut mail = Mail::new(inbox);
        mail.from_ = "jane@example.com".to_string();
        mail.to = "john@example.org".to_string();
        mail.subject = "Hello".to_string();
        mail.date = Some(Utc.with_ymd_and_hms(2025, 7, 1, 8, 30, 0).unwrap());
        mail.message_id = "<m1@example.com>".to_string();
        repo.save(&mut mail).await.unwrap();

        let loaded = repo.get(mail.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(loaded.from_, "jane@example.com");
        assert_eq!(loaded.subject, "Hello");
        assert_eq!(loaded.date, mail.date);
        assert_eq!(loaded.message_id, "<m1@example.com>");
        assert!(!loaded.flags.sent);
    }

    #[tokio::test]
    async fn save_refuses_malformed_addresses() {
        let db = Database::in_memory().await.unwrap();
        let inbox = mailbox(&db, "Inbox").await;

        let mut mail = Mail::new(inbox);
        mail.to = "not-an-address".to_string();

        assert!(matches!(
            db.mails().save(&mut mail).await,
            Err(Error::Validation(errors)) if errors.len() == 1
        ));
        assert!(mail.id.is_none());
    }

    #[tokio::test]
    async fn list_by_mailbox_orders_by_date_desc() {
        let db = Database::in_memory().await.unwrap();
        let inbox = mailbox(&db, "Inbox").await;
        let repo = db.mails();

        for (subject, day) in [("older", 1), ("newest", 20), ("middle", 10)] {
            let mut mail = Mail::new(inbox);
            mail.subject = subject.to_string();
            mail.date = Some(Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap());
            repo.save(&mut mail).await.unwrap();
        }

        let subjects: Vec<String> = repo
            .list_by_mailbox(inbox)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.subject)
            .collect();
        assert_eq!(subjects, vec!["newest", "middle", "older"]);
    }

    #[tokio::test]
    async fn queued_skips_sent_records() {
        let db = Database::in_memory().await.unwrap();
        let outbox = mailbox(&db, "Outbox").await;
        let repo = db.mails();

        let mut first = Mail::new(outbox);
        first.subject = "first".to_string();
        repo.save(&mut first).await.unwrap();

        let mut second = Mail::new(outbox);
        second.subject = "second".to_string();
        repo.save(&mut second).await.unwrap();

        repo.mark_sent(first.id.unwrap()).await.unwrap();

        let queued = repo.queued(outbox).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].subject, "second");
    }

    #[tokio::test]
    async fn move_and_count() {
        let db = Database::in_memory().await.unwrap();
        let outbox = mailbox(&db, "Outbox").await;
        let sent = mailbox(&db, "Sent").await;
        let repo = db.mails();

        let mut mail = Mail::new(outbox);
        repo.save(&mut mail).await.unwrap();
        let id = mail.id.unwrap();

        assert_eq!(repo.count_in_mailbox(outbox).await.unwrap(), 1);
        repo.move_to_mailbox(id, sent).await.unwrap();
        assert_eq!(repo.count_in_mailbox(outbox).await.unwrap(), 0);
        assert_eq!(repo.count_in_mailbox(sent).await.unwrap(), 1);
        assert_eq!(repo.get(id).await.unwrap().unwrap().mailbox, sent);
    }

    #[tokio::test]
    async fn flags_roundtrip() {
        let db = Database::in_memory().await.unwrap();
        let inbox = mailbox(&db, "Inbox").await;
        let repo = db.mails();

        let mut mail = Mail::new(inbox);
        repo.save(&mut mail).await.unwrap();
        let id = mail.id.unwrap();

        let flags = MailFlags {
            seen: true,
            flagged: true,
            ..MailFlags::default()
        };
        repo.set_flags(id, flags).await.unwrap();

        let loaded = repo.get(id).await.unwrap().unwrap();
        assert!(loaded.flags.seen);
        assert!(loaded.flags.flagged);
        assert!(!loaded.flags.draft);
    }

    #[tokio::test]
    async fn record_attempt_increments() {
        let db = Database::in_memory().await.unwrap();
        let outbox = mailbox(&db, "Outbox").await;
        let repo = db.mails();

        let mut mail = Mail::new(outbox);
        repo.save(&mut mail).await.unwrap();
        let id = mail.id.unwrap();

        assert_eq!(repo.record_attempt(id).await.unwrap(), 1);
        assert_eq!(repo.record_attempt(id).await.unwrap(), 2);
        assert_eq!(repo.get(id).await.unwrap().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn set_blob_updates_reference() {
        let db = Database::in_memory().await.unwrap();
        let inbox = mailbox(&db, "Inbox").await;
        let repo = db.mails();

        let mut mail = Mail::new(inbox);
        repo.save(&mut mail).await.unwrap();
        let id = mail.id.unwrap();

        let blob = BlobRef {
            digest: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            collision: 1,
        };
        repo.set_blob(id, &blob, 42).await.unwrap();

        let loaded = repo.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.digest.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
        assert_eq!(loaded.collision, 1);
        assert_eq!(loaded.size, 42);
    }

    #[tokio::test]
    async fn ownership_and_readable_by() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.mails();

        let mut owned = Mailbox::owned_by("Owned", UserId(1));
        db.mailboxes().save(&mut owned).await.unwrap();
        let owned_id = owned.id.unwrap();

        let mut shared = Mailbox::owned_by("Shared", UserId(2));
        db.mailboxes().save(&mut shared).await.unwrap();
        let shared_id = shared.id.unwrap();
        db.mailboxes()
            .set_read_users(shared_id, &[UserId(1)])
            .await
            .unwrap();

        let mut private = Mailbox::owned_by("Private", UserId(3));
        db.mailboxes().save(&mut private).await.unwrap();
        let private_id = private.id.unwrap();

        for (mailbox_id, subject) in [(owned_id, "mine"), (shared_id, "shared"), (private_id, "hidden")] {
            let mut mail = Mail::new(mailbox_id);
            mail.subject = subject.to_string();
            repo.save(&mut mail).await.unwrap();
        }

        let visible: Vec<String> = repo
            .readable_by(UserId(1))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.subject)
            .collect();
        assert_eq!(visible.len(), 2);
        assert!(visible.contains(&"mine".to_string()));
        assert!(visible.contains(&"shared".to_string()));

        let mine = repo.list_by_mailbox(owned_id).await.unwrap();
        assert_eq!(repo.owner_of(mine[0].id.unwrap()).await.unwrap(), Some(UserId(1)));
    }
}
