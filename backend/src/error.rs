//! Error types for Everynote
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a client as plain messages.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Coarse error classification for callers that map errors onto a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NoteNotFound(_) | AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Shorthand used by validation paths
    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AppError::NoteNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::NotFound("Version v".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::invalid("depth").kind(), ErrorKind::InvalidArgument);
        assert_eq!(AppError::Conflict("dup".into()).kind(), ErrorKind::Conflict);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(AppError::from(io).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_serializes_as_message() {
        let json = serde_json::to_string(&AppError::NoteNotFound("abc".into())).unwrap();
        assert_eq!(json, "\"Note not found: abc\"");
    }
}
