//! Persistence of the update journal.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::PersistenceError;
pub use sqlite::SqliteJournal;
#[cfg(test)]
pub use traits::MockUpdateJournal;
pub use traits::UpdateJournal;
