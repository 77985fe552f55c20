use thiserror::Error;

/// Errors raised by the update journal.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The database rejected a query or could not be reached.
    #[error("Journal database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An entry could not be encoded for storage.
    #[error("Journal entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored row no longer decodes into a journal entry.
    #[error("Journal entry {id} ({kind}) is unreadable: {reason}")]
    CorruptEntry { id: i64, kind: String, reason: String },

    /// The embedded schema migrations failed.
    #[error("Journal migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
