mod config;
mod error;
mod store;

pub use config::RtdbConfig;
pub use error::RtdbDaoError;
pub use store::RtdbLiveStore;

use crate::dao::storage::StorageError;

impl From<RtdbDaoError> for StorageError {
    fn from(err: RtdbDaoError) -> Self {
        match err {
            RtdbDaoError::TransactionContention { path, attempts } => {
                StorageError::Contention { path, attempts }
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
