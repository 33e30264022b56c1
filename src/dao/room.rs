//! Typed access to `rooms/{roomId}` on top of a [`LiveStore`].

use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::BoxStream;

use crate::dao::{
    live_store::LiveStore,
    models::RoomEntity,
    storage::{StorageError, StorageResult},
};

enum MutationStep<T, E> {
    Missing,
    Malformed(serde_json::Error),
    Applied(Result<T, E>),
}

/// Repository over room nodes.
#[derive(Clone)]
pub struct RoomRepository {
    store: Arc<dyn LiveStore>,
}

impl RoomRepository {
    /// Wrap `store`.
    pub fn new(store: Arc<dyn LiveStore>) -> Self {
        Self { store }
    }

    /// Store path of a room node.
    pub fn path(room_id: &str) -> String {
        format!("rooms/{room_id}")
    }

    /// Decode the room, `None` when it does not exist.
    pub async fn find(&self, room_id: &str) -> StorageResult<Option<RoomEntity>> {
        let path = Self::path(room_id);
        let Some(raw) = self.store.get(&path).await? else {
            return Ok(None);
        };
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|err| StorageError::malformed(path, err))
    }

    /// Remove the whole room node.
    pub async fn delete(&self, room_id: &str) -> StorageResult<()> {
        self.store.delete(&Self::path(room_id)).await
    }

    /// Compare-and-set over the whole room node.
    ///
    /// `mutation` edits the decoded room and returns `Ok` to commit or `Err` to abort without
    /// writing. The closure can run several times when the backend retries a contended write;
    /// only the outcome of the last run is returned. `Ok(None)` means the room does not exist.
    pub async fn mutate<T, E, F>(
        &self,
        room_id: &str,
        mut mutation: F,
    ) -> StorageResult<Option<Result<T, E>>>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnMut(&mut RoomEntity) -> Result<T, E> + Send + 'static,
    {
        let path = Self::path(room_id);
        let slot: Arc<Mutex<Option<MutationStep<T, E>>>> = Arc::new(Mutex::new(None));
        let recorder = slot.clone();

        self.store
            .transaction(
                &path,
                Box::new(move |current| {
                    let (step, next) = match current {
                        None => (MutationStep::Missing, None),
                        Some(raw) => match serde_json::from_value::<RoomEntity>(raw) {
                            Err(err) => (MutationStep::Malformed(err), None),
                            Ok(mut room) => match mutation(&mut room) {
                                Err(rejection) => (MutationStep::Applied(Err(rejection)), None),
                                Ok(output) => match serde_json::to_value(&room) {
                                    Ok(value) => (MutationStep::Applied(Ok(output)), Some(value)),
                                    Err(err) => (MutationStep::Malformed(err), None),
                                },
                            },
                        },
                    };
                    *recorder.lock().unwrap_or_else(PoisonError::into_inner) = Some(step);
                    next
                }),
            )
            .await?;

        let step = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match step {
            None | Some(MutationStep::Missing) => Ok(None),
            Some(MutationStep::Malformed(err)) => Err(StorageError::malformed(path, err)),
            Some(MutationStep::Applied(result)) => Ok(Some(result)),
        }
    }

    /// Check that the live store answers.
    pub async fn health_check(&self) -> StorageResult<()> {
        self.store.health_check().await
    }

    /// Keys of players whose presence flag disappears from now on.
    pub async fn presence_removals(
        &self,
        room_id: &str,
    ) -> StorageResult<BoxStream<'static, String>> {
        self.store
            .subscribe_child_removed(&format!("{}/presence", Self::path(room_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::dao::{live_store::memory::MemoryLiveStore, models::RoomStatus};

    async fn seeded() -> (MemoryLiveStore, RoomRepository) {
        let store = MemoryLiveStore::new();
        store
            .set(
                "rooms/r1",
                json!({
                    "hostId": "a",
                    "status": "waiting",
                    "players": { "a": { "username": "ada" }, "b": { "username": "bob" } },
                    "presence": { "a": true, "b": true }
                }),
            )
            .await
            .unwrap();
        let repo = RoomRepository::new(Arc::new(store.clone()));
        (store, repo)
    }

    #[tokio::test]
    async fn mutate_commits_on_ok_and_skips_on_err() {
        let (_, repo) = seeded().await;

        let committed = repo
            .mutate("r1", |room| {
                room.status = RoomStatus::Playing;
                Ok::<_, ()>(room.players.len())
            })
            .await
            .unwrap();
        assert_eq!(committed, Some(Ok(2)));

        let rejected = repo
            .mutate("r1", |room| {
                room.status = RoomStatus::Ended;
                Err::<(), _>("nope")
            })
            .await
            .unwrap();
        assert_eq!(rejected, Some(Err("nope")));

        let room = repo.find("r1").await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn mutate_reports_missing_room() {
        let (_, repo) = seeded().await;
        let outcome = repo
            .mutate("ghost", |_| Ok::<_, ()>(()))
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(repo.find("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn presence_removals_stream_player_ids() {
        let (store, repo) = seeded().await;
        let mut removals = repo.presence_removals("r1").await.unwrap();
        store.delete("rooms/r1/presence/b").await.unwrap();
        assert_eq!(removals.next().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn malformed_room_is_reported_as_such() {
        let store = MemoryLiveStore::new();
        store
            .set("rooms/bad", json!({ "players": "not-a-map" }))
            .await
            .unwrap();
        let repo = RoomRepository::new(Arc::new(store));
        assert!(matches!(
            repo.find("bad").await,
            Err(StorageError::Malformed { .. })
        ));
    }
}
