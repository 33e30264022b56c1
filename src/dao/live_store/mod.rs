//! Hierarchical live-state store holding rooms and presence flags.
//!
//! Paths are slash separated (`rooms/{id}/players/{playerId}`). Writing `null` at a path
//! removes it, mirroring realtime tree databases.

/// In-process tree used by default and in tests.
pub mod memory;
/// Firebase Realtime Database over REST.
#[cfg(feature = "rtdb-store")]
pub mod rtdb;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};

use crate::dao::storage::StorageResult;

/// Transaction body: receives the current value (if any) and returns the value to commit,
/// or `None` to abort without writing. May run more than once on contended backends.
pub type Updater = Box<dyn FnMut(Option<Value>) -> Option<Value> + Send>;

/// Result of [`LiveStore::transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// Whether the updater's value was written.
    pub committed: bool,
    /// Value at the path after the transaction.
    pub snapshot: Option<Value>,
}

/// Abstraction over the realtime tree database.
pub trait LiveStore: Send + Sync {
    /// Value at `path`, `None` when absent.
    fn get(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    /// Replace the value at `path`.
    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<()>>;
    /// Merge `patch` under `path`. Keys may themselves be nested paths.
    fn update(&self, path: &str, patch: Map<String, Value>)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Remove `path` and everything below it.
    fn delete(&self, path: &str) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically read-modify-write the value at `path`.
    fn transaction(
        &self,
        path: &str,
        updater: Updater,
    ) -> BoxFuture<'static, StorageResult<TransactionOutcome>>;
    /// Stream the keys of children removed below `path` from now on.
    fn subscribe_child_removed(
        &self,
        path: &str,
    ) -> BoxFuture<'static, StorageResult<BoxStream<'static, String>>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Split a store path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Join a base path and a relative key.
pub fn join(base: &str, key: &str) -> String {
    let base = base.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_ignore_redundant_slashes() {
        assert_eq!(segments("/rooms//r1/presence/"), vec!["rooms", "r1", "presence"]);
        assert!(segments("").is_empty());
    }

    #[test]
    fn join_handles_root_and_trailing_slashes() {
        assert_eq!(join("", "rooms"), "rooms");
        assert_eq!(join("rooms/", "/r1"), "rooms/r1");
    }
}
