use std::{collections::BTreeSet, sync::Arc};

use futures::{
    StreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{LiveStore, TransactionOutcome, Updater, join, segments};
use crate::dao::storage::StorageResult;

/// In-process tree store used for development and tests.
///
/// Every operation runs under one lock, which makes [`LiveStore::transaction`] trivially
/// atomic. Child-removal subscribers are notified by diffing the watched node's keys around
/// each mutation.
#[derive(Clone, Default)]
pub struct MemoryLiveStore {
    inner: Arc<Mutex<MemoryTree>>,
}

struct MemoryTree {
    root: Value,
    watchers: Vec<Watcher>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            watchers: Vec::new(),
        }
    }
}

struct Watcher {
    path: Vec<String>,
    tx: mpsc::UnboundedSender<String>,
}

impl MemoryTree {
    /// Apply `mutation` and notify watchers about children that disappeared.
    fn mutate<T>(&mut self, mutation: impl FnOnce(&mut Value) -> T) -> T {
        let before: Vec<BTreeSet<String>> = self
            .watchers
            .iter()
            .map(|watcher| child_keys(&self.root, &watcher.path))
            .collect();

        let output = mutation(&mut self.root);

        let root = &self.root;
        let mut index = 0;
        self.watchers.retain(|watcher| {
            let previous = &before[index];
            index += 1;
            let current = child_keys(root, &watcher.path);
            previous
                .difference(&current)
                .all(|key| watcher.tx.send(key.clone()).is_ok())
                && !watcher.tx.is_closed()
        });

        output
    }
}

impl MemoryLiveStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn owned_segments(path: &str) -> Vec<String> {
    segments(path).into_iter().map(str::to_owned).collect()
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
        .filter(|value| !value.is_null())
}

fn child_keys(root: &Value, path: &[String]) -> BTreeSet<String> {
    lookup(root, path)
        .and_then(Value::as_object)
        .map(|children| children.keys().cloned().collect())
        .unwrap_or_default()
}

fn write(node: &mut Value, path: &[String], value: Value) {
    if value.is_null() {
        remove(node, path);
        return;
    }

    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Some(children) = node.as_object_mut() {
        let child = children.entry(head.clone()).or_insert(Value::Null);
        write(child, rest, value);
    }
}

fn remove(node: &mut Value, path: &[String]) {
    let Some((head, rest)) = path.split_first() else {
        *node = Value::Object(Map::new());
        return;
    };
    let Some(children) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        children.remove(head);
        return;
    }

    if let Some(child) = children.get_mut(head) {
        remove(child, rest);
        // Empty branches vanish, as they do in realtime tree databases.
        if child.as_object().is_some_and(Map::is_empty) {
            children.remove(head);
        }
    }
}

impl LiveStore for MemoryLiveStore {
    fn get(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let inner = self.inner.clone();
        let path = owned_segments(path);
        Box::pin(async move {
            let tree = inner.lock().await;
            Ok(lookup(&tree.root, &path).cloned())
        })
    }

    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let path = owned_segments(path);
        Box::pin(async move {
            let mut tree = inner.lock().await;
            tree.mutate(|root| write(root, &path, value));
            Ok(())
        })
    }

    fn update(
        &self,
        path: &str,
        patch: Map<String, Value>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let base = path.to_string();
        Box::pin(async move {
            let mut tree = inner.lock().await;
            tree.mutate(|root| {
                for (key, value) in patch {
                    write(root, &owned_segments(&join(&base, &key)), value);
                }
            });
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let path = owned_segments(path);
        Box::pin(async move {
            let mut tree = inner.lock().await;
            tree.mutate(|root| remove(root, &path));
            Ok(())
        })
    }

    fn transaction(
        &self,
        path: &str,
        mut updater: Updater,
    ) -> BoxFuture<'static, StorageResult<TransactionOutcome>> {
        let inner = self.inner.clone();
        let path = owned_segments(path);
        Box::pin(async move {
            let mut tree = inner.lock().await;
            let current = lookup(&tree.root, &path).cloned();
            match updater(current.clone()) {
                Some(next) => {
                    let snapshot = (!next.is_null()).then(|| next.clone());
                    tree.mutate(|root| write(root, &path, next));
                    Ok(TransactionOutcome {
                        committed: true,
                        snapshot,
                    })
                }
                None => Ok(TransactionOutcome {
                    committed: false,
                    snapshot: current,
                }),
            }
        })
    }

    fn subscribe_child_removed(
        &self,
        path: &str,
    ) -> BoxFuture<'static, StorageResult<BoxStream<'static, String>>> {
        let inner = self.inner.clone();
        let path = owned_segments(path);
        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            inner.lock().await.watchers.push(Watcher { path, tx });
            Ok(UnboundedReceiverStream::new(rx).boxed())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn update_merges_nested_paths_and_null_deletes() {
        let store = MemoryLiveStore::new();
        store
            .set("rooms/r1", json!({"status": "waiting", "players": {"a": {"score": 1}}}))
            .await
            .unwrap();

        let mut patch = Map::new();
        patch.insert("status".into(), json!("playing"));
        patch.insert("players/a/score".into(), json!(0));
        patch.insert("players/b".into(), json!({"score": 2}));
        store.update("rooms/r1", patch).await.unwrap();

        let mut patch = Map::new();
        patch.insert("players/b".into(), Value::Null);
        store.update("rooms/r1", patch).await.unwrap();

        let room = store.get("rooms/r1").await.unwrap().unwrap();
        assert_eq!(
            room,
            json!({"status": "playing", "players": {"a": {"score": 0}}})
        );
    }

    #[tokio::test]
    async fn removing_last_child_prunes_empty_parents() {
        let store = MemoryLiveStore::new();
        store.set("rooms/r1/presence/a", json!(true)).await.unwrap();
        store.delete("rooms/r1/presence/a").await.unwrap();
        assert_eq!(store.get("rooms/r1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn aborted_transaction_leaves_value_untouched() {
        let store = MemoryLiveStore::new();
        store.set("counter", json!(1)).await.unwrap();

        let outcome = store
            .transaction("counter", Box::new(|_| None))
            .await
            .unwrap();
        assert!(!outcome.committed);
        assert_eq!(outcome.snapshot, Some(json!(1)));

        let outcome = store
            .transaction(
                "counter",
                Box::new(|current| current.and_then(|v| v.as_i64()).map(|n| json!(n + 1))),
            )
            .await
            .unwrap();
        assert!(outcome.committed);
        assert_eq!(store.get("counter").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn child_removed_subscribers_see_each_removed_key() {
        let store = MemoryLiveStore::new();
        store
            .set("rooms/r1/presence", json!({"a": true, "b": true, "c": true}))
            .await
            .unwrap();
        let mut removed = store
            .subscribe_child_removed("rooms/r1/presence")
            .await
            .unwrap();

        store.delete("rooms/r1/presence/b").await.unwrap();
        store.set("rooms/r1/presence/d", json!(true)).await.unwrap();
        store.delete("rooms/r1").await.unwrap();

        assert_eq!(removed.next().await.as_deref(), Some("b"));
        let mut rest = vec![
            removed.next().await.unwrap(),
            removed.next().await.unwrap(),
            removed.next().await.unwrap(),
        ];
        rest.sort();
        assert_eq!(rest, vec!["a", "c", "d"]);
    }
}
