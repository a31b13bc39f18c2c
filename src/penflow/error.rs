use crate::store::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PenflowError {
    #[error("{0} is not initialized. Call initialize() first.")]
    NotInitialized(String),

    #[error("Database {operation} failed: {cause}")]
    Database {
        operation: String,
        #[source]
        cause: StorageError,
    },

    #[error("Failed to {operation} file{}: {cause}", file_id_suffix(.file_id))]
    FileOperation {
        operation: String,
        file_id: Option<String>,
        #[source]
        cause: Box<PenflowError>,
    },

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Invalid configuration at {path}: {cause}")]
    Config {
        path: String,
        #[source]
        cause: StorageError,
    },
}

pub type Result<T> = std::result::Result<T, PenflowError>;

fn file_id_suffix(file_id: &Option<String>) -> String {
    match file_id {
        Some(id) => format!(" (ID: {})", id),
        None => String::new(),
    }
}

impl PenflowError {
    pub fn not_initialized(component: &str) -> Self {
        Self::NotInitialized(component.to_string())
    }

    pub fn database(operation: &str, cause: impl Into<StorageError>) -> Self {
        Self::Database {
            operation: operation.to_string(),
            cause: cause.into(),
        }
    }

    pub fn file_operation(operation: &str, file_id: Option<&str>, cause: PenflowError) -> Self {
        Self::FileOperation {
            operation: operation.to_string(),
            file_id: file_id.map(str::to_string),
            cause: Box::new(cause),
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(path: impl AsRef<std::path::Path>, cause: impl Into<StorageError>) -> Self {
        Self::Config {
            path: path.as_ref().display().to_string(),
            cause: cause.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized(_) => "NOT_INITIALIZED",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::FileOperation { .. } => "FILE_OPERATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// Whether the caller can fix the problem and retry.
    ///
    /// Missing initialization and bad input are recoverable. Storage failures
    /// need user intervention (freeing space, fixing permissions).
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotInitialized(_) | Self::Validation { .. } | Self::Config { .. } => true,
            Self::Database { .. } => false,
            Self::FileOperation { cause, .. } => cause.is_recoverable(),
        }
    }

    /// Short message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotInitialized(_) => "The library is still loading, try again".to_string(),
            Self::Database { operation, .. } if operation == "initialization" => {
                "Could not open local storage".to_string()
            }
            Self::Database { cause, .. } => format!("Failed to save: {}", cause),
            Self::FileOperation { operation, .. } => format!("Could not {} the file", operation),
            Self::Validation { reason, .. } => reason.clone(),
            Self::Config { path, .. } => format!("Could not read settings from {}", path),
        }
    }
}
