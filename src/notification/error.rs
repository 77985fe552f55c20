use thiserror::Error;

/// Why an alert could not be archived or delivered.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The configured Telegram API URL is unusable.
    #[error("Invalid Telegram API URL: {0}")]
    InvalidApiUrl(String),

    /// Reading or writing an image failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telegram answered but did not accept the message.
    #[error("Telegram rejected the message: {0}")]
    Rejected(String),

    /// The request did not complete.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}
