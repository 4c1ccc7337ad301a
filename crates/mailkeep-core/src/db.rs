//! Database handle shared by the repositories.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;
use crate::defaults::DefaultsRepository;
use crate::mail::MailRepository;
use crate::mailbox::MailboxRepository;

/// Open connection pool with the schema initialized.
///
/// All repositories hand out by this handle share one pool, so mailboxes,
/// mail records, and defaults live in the same database file and queries
/// may join across them.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (and creates, if needed) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Creates an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<()> {
        MailboxRepository::initialize(&self.pool).await?;
        MailRepository::initialize(&self.pool).await?;
        DefaultsRepository::initialize(&self.pool).await?;
        Ok(())
    }

    /// Returns the mailbox repository.
    #[must_use]
    pub fn mailboxes(&self) -> MailboxRepository {
        MailboxRepository::new(self.pool.clone())
    }

    /// Returns the mail record repository.
    #[must_use]
    pub fn mails(&self) -> MailRepository {
        MailRepository::new(self.pool.clone())
    }

    /// Returns the mailbox defaults repository.
    #[must_use]
    pub fn defaults(&self) -> DefaultsRepository {
        DefaultsRepository::new(self.pool.clone())
    }
}
