//! Mailbox storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{Mailbox, MailboxId, Security, SmtpServer, UserId};
use crate::{Error, Result};

/// Repository for mailbox storage, access lists, and hierarchy links.
pub struct MailboxRepository {
    pool: SqlitePool,
}

impl MailboxRepository {
    /// Creates a repository over an open pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the mailbox schema.
    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailboxes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner INTEGER,
                subscribed INTEGER NOT NULL DEFAULT 0,
                smtp_host TEXT,
                smtp_port INTEGER NOT NULL DEFAULT 0,
                smtp_security TEXT NOT NULL DEFAULT 'tls',
                smtp_username TEXT NOT NULL DEFAULT '',
                smtp_password TEXT NOT NULL DEFAULT '',
                smtp_sender TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailbox_parents (
                parent INTEGER NOT NULL,
                child INTEGER NOT NULL,
                PRIMARY KEY (parent, child)
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailbox_read_users (
                mailbox INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (mailbox, user_id)
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailbox_write_users (
                mailbox INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (mailbox, user_id)
            )
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Save a mailbox (insert or update).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, mailbox: &mut Mailbox) -> Result<()> {
        let smtp = mailbox.smtp.clone().unwrap_or_default();
        let smtp_host = mailbox.smtp.as_ref().map(|s| s.host.clone());

        if let Some(id) = mailbox.id {
            sqlx::query(
                r"
                UPDATE mailboxes SET
                    name = ?, owner = ?, subscribed = ?,
                    smtp_host = ?, smtp_port = ?, smtp_security = ?,
                    smtp_username = ?, smtp_password = ?, smtp_sender = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                ",
            )
            .bind(&mailbox.name)
            .bind(mailbox.owner.map(|u| u.0))
            .bind(mailbox.subscribed)
            .bind(smtp_host)
            .bind(i64::from(smtp.port))
            .bind(security_to_string(smtp.security))
            .bind(&smtp.username)
            .bind(&smtp.password)
            .bind(&smtp.sender)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO mailboxes (
                    name, owner, subscribed,
                    smtp_host, smtp_port, smtp_security,
                    smtp_username, smtp_password, smtp_sender
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&mailbox.name)
            .bind(mailbox.owner.map(|u| u.0))
            .bind(mailbox.subscribed)
            .bind(smtp_host)
            .bind(i64::from(smtp.port))
            .bind(security_to_string(smtp.security))
            .bind(&smtp.username)
            .bind(&smtp.password)
            .bind(&smtp.sender)
            .execute(&self.pool)
            .await?;

            mailbox.id = Some(MailboxId::new(result.last_insert_rowid()));
            debug!(mailbox = %mailbox.name, "created mailbox");
        }

        Ok(())
    }

    /// Get a mailbox by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: MailboxId) -> Result<Option<Mailbox>> {
        let row = sqlx::query(
            r"
            SELECT id, name, owner, subscribed,
                   smtp_host, smtp_port, smtp_security,
                   smtp_username, smtp_password, smtp_sender
            FROM mailboxes
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_mailbox))
    }

    /// Get all mailboxes, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Mailbox>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, owner, subscribed,
                   smtp_host, smtp_port, smtp_security,
                   smtp_username, smtp_password, smtp_sender
            FROM mailboxes
            ORDER BY name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mailbox).collect())
    }

    /// Delete a mailbox together with its access lists and hierarchy links.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxNotEmpty`] when mail records still reference
    /// the mailbox, or an error if a database query fails.
    pub async fn delete(&self, id: MailboxId) -> Result<()> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM mails WHERE mailbox = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("count");
        if count > 0 {
            return Err(Error::MailboxNotEmpty(id));
        }

        sqlx::query("DELETE FROM mailbox_read_users WHERE mailbox = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM mailbox_write_users WHERE mailbox = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM mailbox_parents WHERE parent = ? OR child = ?")
            .bind(id.0)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM mailboxes WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        debug!(mailbox = %id, "deleted mailbox");
        Ok(())
    }

    /// Replace the read access list.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn set_read_users(&self, id: MailboxId, users: &[UserId]) -> Result<()> {
        self.set_acl("mailbox_read_users", id, users).await
    }

    /// Replace the write access list.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn set_write_users(&self, id: MailboxId, users: &[UserId]) -> Result<()> {
        self.set_acl("mailbox_write_users", id, users).await
    }

    /// Users on the read access list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn read_users(&self, id: MailboxId) -> Result<Vec<UserId>> {
        self.acl("mailbox_read_users", id).await
    }

    /// Users on the write access list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn write_users(&self, id: MailboxId) -> Result<Vec<UserId>> {
        self.acl("mailbox_write_users", id).await
    }

    /// Checks read access: the owner and both access lists qualify.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn can_read(&self, id: MailboxId, user: UserId) -> Result<bool> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS count FROM mailboxes
            WHERE id = ? AND (
                owner = ?
                OR id IN (SELECT mailbox FROM mailbox_read_users WHERE user_id = ?)
                OR id IN (SELECT mailbox FROM mailbox_write_users WHERE user_id = ?)
            )
            ",
        )
        .bind(id.0)
        .bind(user.0)
        .bind(user.0)
        .bind(user.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Checks write access: the owner and the write list qualify.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn can_write(&self, id: MailboxId, user: UserId) -> Result<bool> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS count FROM mailboxes
            WHERE id = ? AND (
                owner = ?
                OR id IN (SELECT mailbox FROM mailbox_write_users WHERE user_id = ?)
            )
            ",
        )
        .bind(id.0)
        .bind(user.0)
        .bind(user.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Link a mailbox under a parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn add_parent(&self, child: MailboxId, parent: MailboxId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO mailbox_parents (parent, child) VALUES (?, ?)")
            .bind(parent.0)
            .bind(child.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a hierarchy link.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn remove_parent(&self, child: MailboxId, parent: MailboxId) -> Result<()> {
        sqlx::query("DELETE FROM mailbox_parents WHERE parent = ? AND child = ?")
            .bind(parent.0)
            .bind(child.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Parents of a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn parents(&self, child: MailboxId) -> Result<Vec<MailboxId>> {
        let rows = sqlx::query("SELECT parent FROM mailbox_parents WHERE child = ? ORDER BY parent")
            .bind(child.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| MailboxId::new(row.get("parent")))
            .collect())
    }

    /// Children of a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn children(&self, parent: MailboxId) -> Result<Vec<MailboxId>> {
        let rows = sqlx::query("SELECT child FROM mailbox_parents WHERE parent = ? ORDER BY child")
            .bind(parent.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| MailboxId::new(row.get("child")))
            .collect())
    }

    async fn set_acl(&self, table: &str, id: MailboxId, users: &[UserId]) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {table} WHERE mailbox = ?"))
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        for user in users {
            sqlx::query(&format!(
                "INSERT OR IGNORE INTO {table} (mailbox, user_id) VALUES (?, ?)"
            ))
            .bind(id.0)
            .bind(user.0)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn acl(&self, table: &str, id: MailboxId) -> Result<Vec<UserId>> {
        let rows = sqlx::query(&format!(
            "SELECT user_id FROM {table} WHERE mailbox = ? ORDER BY user_id"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| UserId(row.get("user_id"))).collect())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_mailbox(row: &SqliteRow) -> Mailbox {
    let smtp = row
        .get::<Option<String>, _>("smtp_host")
        .map(|host| SmtpServer {
            host,
            port: row.get::<i64, _>("smtp_port") as u16,
            security: string_to_security(row.get("smtp_security")),
            username: row.get("smtp_username"),
            password: row.get("smtp_password"),
            sender: row.get("smtp_sender"),
        });

    Mailbox {
        id: Some(MailboxId::new(row.get("id"))),
        name: row.get("name"),
        owner: row.get::<Option<i64>, _>("owner").map(UserId),
        subscribed: row.get::<i64, _>("subscribed") != 0,
        smtp,
    }
}

const fn security_to_string(security: Security) -> &'static str {
    match security {
        Security::None => "none",
        Security::Tls => "tls",
        Security::StartTls => "starttls",
    }
}

fn string_to_security(s: &str) -> Security {
    match s {
        "none" => Security::None,
        "starttls" => Security::StartTls,
        _ => Security::Tls,
    }
}
