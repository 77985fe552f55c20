//! The update journal stored in a SQLite table.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

use super::{error::PersistenceError, traits::UpdateJournal};
use crate::models::JournalEntry;

mod journal_sql {
    pub const INSERT_ENTRY: &str =
        "INSERT INTO update_journal (kind, payload, recorded_at) VALUES (?, ?, ?)";

    pub const SELECT_ALL: &str = "SELECT id, kind, payload FROM update_journal ORDER BY id ASC";
}

/// How long a writer waits for a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// [`UpdateJournal`] backed by the `update_journal` table.
pub struct SqliteJournal {
    pool: SqlitePool,
}

impl SqliteJournal {
    /// Opens the journal database, creating the file on first use.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePool::connect_with(options).await?;
        tracing::info!(database_url, "Update journal opened.");
        Ok(Self { pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        if let Err(e) = sqlx::migrate!("./migrations").run(&self.pool).await {
            tracing::error!(error = %e, "Update journal migration failed.");
            return Err(e.into());
        }
        Ok(())
    }

    /// Waits for in-flight queries and closes every connection.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Update journal closed.");
    }
}

#[async_trait]
impl UpdateJournal for SqliteJournal {
    #[tracing::instrument(skip(self, entry), fields(kind = entry.kind()), level = "debug")]
    async fn append(&self, entry: &JournalEntry) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(&entry.payload())?;

        sqlx::query(journal_sql::INSERT_ENTRY)
            .bind(entry.kind())
            .bind(payload)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn replay_all(&self) -> Result<Vec<JournalEntry>, PersistenceError> {
        let rows = sqlx::query(journal_sql::SELECT_ALL).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let kind: String = row.try_get("kind")?;
            let payload: String = row.try_get("payload")?;

            let parsed = serde_json::from_str(&payload)
                .and_then(|payload| JournalEntry::from_parts(&kind, payload));
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    return Err(PersistenceError::CorruptEntry { id, kind, reason: e.to_string() });
                }
            }
        }
        Ok(entries)
    }
}
