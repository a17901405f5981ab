//! Error types for entity store adapters.

use super::Collection;
use crate::model::Id;
use thiserror::Error;

/// Errors that can occur while talking to an entity store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: Id },

    /// The store rejected or failed the request (network, permission, server error)
    #[error("Entity store request failed{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    /// A record body could not be encoded or decoded
    #[error("Malformed {collection} record: {message}")]
    Malformed {
        collection: Collection,
        message: String,
    },
}

impl StoreError {
    pub fn remote(message: impl Into<String>) -> Self {
        StoreError::Remote {
            status: None,
            message: message.into(),
        }
    }

    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Remote { status: None, .. } => true,
            StoreError::Remote {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Remote {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for StoreError {
    fn from(err: url::ParseError) -> Self {
        StoreError::remote(format!("invalid store URL: {err}"))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::remote(format!("sqlite: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_includes_status() {
        let err = StoreError::Remote {
            status: Some(403),
            message: "forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Entity store request failed with status 403: forbidden"
        );
        assert_eq!(
            StoreError::remote("connection reset").to_string(),
            "Entity store request failed: connection reset"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(StoreError::remote("timeout").is_retryable());
        assert!(StoreError::Remote {
            status: Some(503),
            message: String::new()
        }
        .is_retryable());
        assert!(!StoreError::Remote {
            status: Some(400),
            message: String::new()
        }
        .is_retryable());
        assert!(!StoreError::NotFound {
            collection: Collection::Rooms,
            id: 1
        }
        .is_retryable());
    }
}
