//! Error types shared by the Firebase RTDB REST implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`RtdbDaoError`] failures.
pub type RtdbResult<T> = Result<T, RtdbDaoError>;

/// Failures that can occur while talking to the realtime database.
#[derive(Debug, Error)]
pub enum RtdbDaoError {
    /// Required environment variable is missing.
    #[error("missing RTDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build RTDB client")]
    ClientBuilder {
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send RTDB request to `{path}`")]
    RequestSend {
        /// Requested path.
        path: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The database answered with an unexpected status code.
    #[error("unexpected RTDB response status {status} for `{path}`")]
    RequestStatus {
        /// Requested path.
        path: String,
        /// Status returned by the database.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode RTDB response for `{path}`")]
    DecodeResponse {
        /// Requested path.
        path: String,
        /// HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// A conditional read did not return the ETag needed for compare-and-set.
    #[error("RTDB response for `{path}` carried no ETag")]
    MissingEtag {
        /// Requested path.
        path: String,
    },
    /// Every compare-and-set attempt lost against a concurrent writer.
    #[error("RTDB transaction on `{path}` failed after {attempts} attempt(s)")]
    TransactionContention {
        /// Transaction path.
        path: String,
        /// Attempts made.
        attempts: u32,
    },
}
