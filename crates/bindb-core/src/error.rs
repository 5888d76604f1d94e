//! Error taxonomy for the storage core (spec §7).
//!
//! One flat [`ErrorKind`] enum mirrors the taxonomy table exactly; [`StoreError`]
//! wraps it with a message, a timestamp and an optional metadata bag so the HTTP
//! transport collaborator can map it to a status code and a JSON body without
//! re-deriving either from the message text.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

/// The closed set of failure kinds a table/database operation can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    MissingRequiredField,
    InvalidSchema,
    InvalidColumnType,
    InvalidIdFormat,
    InvalidBufferSize,
    DuplicateKey,
    TableNotFound,
    DatabaseNotFound,
    RecordNotFound,
    StorageError,
    FileSystemError,
    SerializationError,
    DeserializationError,
    BufferOverflow,
    InternalError,
}

impl ErrorKind {
    /// The HTTP status code the out-of-scope transport collaborator should map
    /// this kind to (§7).
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::ValidationError
            | ErrorKind::MissingRequiredField
            | ErrorKind::InvalidSchema
            | ErrorKind::InvalidColumnType
            | ErrorKind::InvalidIdFormat
            | ErrorKind::InvalidBufferSize => 400,
            ErrorKind::DuplicateKey => 409,
            ErrorKind::TableNotFound | ErrorKind::DatabaseNotFound | ErrorKind::RecordNotFound => 404,
            ErrorKind::StorageError
            | ErrorKind::FileSystemError
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError
            | ErrorKind::BufferOverflow
            | ErrorKind::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorKind::InvalidSchema => "INVALID_SCHEMA",
            ErrorKind::InvalidColumnType => "INVALID_COLUMN_TYPE",
            ErrorKind::InvalidIdFormat => "INVALID_ID_FORMAT",
            ErrorKind::InvalidBufferSize => "INVALID_BUFFER_SIZE",
            ErrorKind::DuplicateKey => "DUPLICATE_KEY",
            ErrorKind::TableNotFound => "TABLE_NOT_FOUND",
            ErrorKind::DatabaseNotFound => "DATABASE_NOT_FOUND",
            ErrorKind::RecordNotFound => "RECORD_NOT_FOUND",
            ErrorKind::StorageError => "STORAGE_ERROR",
            ErrorKind::FileSystemError => "FILE_SYSTEM_ERROR",
            ErrorKind::SerializationError => "SERIALIZATION_ERROR",
            ErrorKind::DeserializationError => "DESERIALIZATION_ERROR",
            ErrorKind::BufferOverflow => "BUFFER_OVERFLOW",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

/// Path/operation/field metadata carried alongside an error, per §7.
#[derive(Debug, Clone, Default)]
pub struct ErrorMetadata {
    pub path: Option<PathBuf>,
    pub operation: Option<String>,
    pub field: Option<String>,
}

impl ErrorMetadata {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// The single error type returned by every fallible operation in this crate.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: SystemTime,
    pub metadata: ErrorMetadata,
}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            occurred_at: SystemTime::now(),
            metadata: ErrorMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ErrorMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.metadata.operation = Some(operation.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata.path = Some(path.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.metadata.field = Some(field.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

/// Convenience constructors, one per kind, mirroring the teacher's per-variant
/// helper style (`TableError::NotFound(name)` etc. in the upstream error enum).
impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn missing_required_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(ErrorKind::MissingRequiredField, format!("missing required field `{field}`"))
            .with_field(field)
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSchema, message)
    }

    pub fn invalid_column_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidColumnType, message)
    }

    pub fn invalid_id_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidIdFormat, message)
    }

    pub fn invalid_buffer_size(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidBufferSize, message)
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::TableNotFound, format!("table `{name}` not found"))
    }

    pub fn database_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::DatabaseNotFound, format!("database `{name}` not found"))
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageError, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError, message)
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeserializationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::FileSystemError, err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::SerializationError, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
