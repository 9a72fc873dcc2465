use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgoraError {
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("search index error: {message}")]
    Index { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String },
    #[error("validation error for `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("group directory error: {message}")]
    Directory { message: String },
}

impl AgoraError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }
}

pub type AgoraResult<T> = Result<T, AgoraError>;

impl From<sea_orm::DbErr> for AgoraError {
    fn from(value: sea_orm::DbErr) -> Self {
        AgoraError::storage(value.to_string())
    }
}

impl From<tantivy::TantivyError> for AgoraError {
    fn from(value: tantivy::TantivyError) -> Self {
        AgoraError::index(value.to_string())
    }
}

impl From<serde_json::Error> for AgoraError {
    fn from(value: serde_json::Error) -> Self {
        AgoraError::storage(value.to_string())
    }
}
