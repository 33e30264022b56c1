use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Backend description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Stored payload could not be mapped onto the expected model.
    #[error("malformed data at `{path}`")]
    Malformed {
        /// Store path of the payload.
        path: String,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// A compare-and-set transaction kept losing against concurrent writers.
    #[error("transaction on `{path}` gave up after {attempts} attempt(s)")]
    Contention {
        /// Transaction path.
        path: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a decoding error for the given store path.
    pub fn malformed(path: impl Into<String>, source: serde_json::Error) -> Self {
        StorageError::Malformed {
            path: path.into(),
            source,
        }
    }
}
