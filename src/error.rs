//! Error types for the watcher.

/// Top-level error type for the publication watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A persisted date does not match the `DD/MM/YYYY` format.
    #[error("invalid date format: {value:?} (expected DD/MM/YYYY)")]
    InvalidDateFormat {
        /// The raw value read from the store.
        value: String,
    },

    /// An existence probe could not reach a definitive answer.
    #[error("probe unknown: {0}")]
    ProbeUnknown(String),

    /// The state store could not be read or written.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    /// A notification channel rejected or failed to deliver a message.
    #[error("notification via {channel} failed: {reason}")]
    NotificationFailure {
        /// Channel identifier (e.g. `telegram`, `whatsapp`).
        channel: String,
        /// Transport error text.
        reason: String,
    },

    /// Configuration error. Fatal only at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Status server error.
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_date_format() {
        let err = WatchError::InvalidDateFormat {
            value: "2024-01-31".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid date format: \"2024-01-31\" (expected DD/MM/YYYY)"
        );
    }

    #[test]
    fn display_notification_failure() {
        let err = WatchError::NotificationFailure {
            channel: "telegram".into(),
            reason: "401 Unauthorized".into(),
        };
        assert_eq!(
            err.to_string(),
            "notification via telegram failed: 401 Unauthorized"
        );
    }

    #[test]
    fn display_store_unavailable() {
        let err = WatchError::StoreUnavailable("connection refused".into());
        assert_eq!(
            err.to_string(),
            "state store unavailable: connection refused"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WatchError>();
    }
}
