//! The update journal interface.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::error::PersistenceError;
use crate::models::JournalEntry;

/// Append-only log of accepted remote mutations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpdateJournal: Send + Sync {
    /// Appends an entry after its mutation succeeded.
    async fn append(&self, entry: &JournalEntry) -> Result<(), PersistenceError>;

    /// Returns every entry in append order.
    async fn replay_all(&self) -> Result<Vec<JournalEntry>, PersistenceError>;
}
