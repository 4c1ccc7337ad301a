//! Mailbox defaults storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{CompanyId, MailboxDefaults};
use crate::Result;
use crate::mailbox::MailboxId;

/// Repository for the per-company mailbox defaults singleton.
pub struct DefaultsRepository {
    pool: SqlitePool,
}

impl DefaultsRepository {
    /// Creates a repository over an open pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the defaults schema.
    pub(crate) async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailbox_defaults (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company INTEGER,
                sent_mailbox INTEGER NOT NULL,
                draft_mailbox INTEGER NOT NULL,
                error_mailbox INTEGER NOT NULL,
                outbox_mailbox INTEGER NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Store assignments for their scope (insert or update).
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn set(&self, defaults: &MailboxDefaults) -> Result<()> {
        let company = defaults.company.map(|c| c.0);

        let existing = sqlx::query("SELECT id FROM mailbox_defaults WHERE company IS ?")
            .bind(company)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            let id: i64 = row.get("id");
            sqlx::query(
                r"
                UPDATE mailbox_defaults SET
                    sent_mailbox = ?, draft_mailbox = ?,
                    error_mailbox = ?, outbox_mailbox = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                ",
            )
            .bind(defaults.sent.0)
            .bind(defaults.draft.0)
            .bind(defaults.error.0)
            .bind(defaults.outbox.0)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r"
                INSERT INTO mailbox_defaults
                    (company, sent_mailbox, draft_mailbox, error_mailbox, outbox_mailbox)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(company)
            .bind(defaults.sent.0)
            .bind(defaults.draft.0)
            .bind(defaults.error.0)
            .bind(defaults.outbox.0)
            .execute(&self.pool)
            .await?;
        }

        debug!(company = ?defaults.company, "stored mailbox defaults");
        Ok(())
    }

    /// Assignments for a company, falling back to the global row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, company: Option<CompanyId>) -> Result<Option<MailboxDefaults>> {
        let row = sqlx::query(
            r"
            SELECT company, sent_mailbox, draft_mailbox, error_mailbox, outbox_mailbox
            FROM mailbox_defaults
            WHERE company IS ?
            ",
        )
        .bind(company.map(|c| c.0))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Some(row_to_defaults(&row)));
        }

        if company.is_some() {
            return self.get_global().await;
        }

        Ok(None)
    }

    /// The global (company-less) assignments, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_global(&self) -> Result<Option<MailboxDefaults>> {
        let row = sqlx::query(
            r"
            SELECT company, sent_mailbox, draft_mailbox, error_mailbox, outbox_mailbox
            FROM mailbox_defaults
            WHERE company IS NULL
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_defaults))
    }

    /// All configured assignment rows (the dispatcher iterates these).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<MailboxDefaults>> {
        let rows = sqlx::query(
            r"
            SELECT company, sent_mailbox, draft_mailbox, error_mailbox, outbox_mailbox
            FROM mailbox_defaults
            ORDER BY company IS NOT NULL, company
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_defaults).collect())
    }
}

fn row_to_defaults(row: &SqliteRow) -> MailboxDefaults {
    MailboxDefaults {
        company: row.get::<Option<i64>, _>("company").map(CompanyId),
        sent: MailboxId::new(row.get("sent_mailbox")),
        draft: MailboxId::new(row.get("draft_mailbox")),
        error: MailboxId::new(row.get("error_mailbox")),
        outbox: MailboxId::new(row.get("outbox_mailbox")),
    }
}
