use std::{collections::BTreeSet, sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Map, Value};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::{
    config::RtdbConfig,
    error::{RtdbDaoError, RtdbResult},
};
use crate::dao::{
    live_store::{LiveStore, TransactionOutcome, Updater},
    storage::StorageResult,
};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const ETAG_HEADER: &str = "ETag";
const IF_MATCH_HEADER: &str = "if-match";

/// Live store backed by the Firebase Realtime Database REST API.
///
/// Transactions use ETag conditional writes; child-removal subscriptions poll shallow reads
/// of the watched node and diff the key sets.
#[derive(Clone)]
pub struct RtdbLiveStore {
    client: Client,
    base_url: Arc<str>,
    auth: Option<Arc<str>>,
    poll_interval: Duration,
    transaction_attempts: u32,
}

impl RtdbLiveStore {
    /// Build the HTTP client and verify the database answers.
    pub async fn connect(config: RtdbConfig) -> RtdbResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RtdbDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            auth: config.auth.map(Arc::<str>::from),
            poll_interval: config.poll_interval,
            transaction_attempts: config.transaction_attempts.max(1),
        };

        store.shallow_keys("rooms").await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}.json", self.base_url, path.trim_matches('/'));
        let builder = self.client.request(method, url);
        match self.auth {
            Some(ref auth) => builder.query(&[("auth", auth.as_ref())]),
            None => builder,
        }
    }

    async fn send(&self, path: &str, builder: reqwest::RequestBuilder) -> RtdbResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| RtdbDaoError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn expect_success(&self, path: &str, response: Response) -> RtdbResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(RtdbDaoError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            })
        }
    }

    async fn decode(&self, path: &str, response: Response) -> RtdbResult<Option<Value>> {
        let value = response
            .json::<Value>()
            .await
            .map_err(|source| RtdbDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn read(&self, path: &str) -> RtdbResult<Option<Value>> {
        let response = self.send(path, self.request(Method::GET, path)).await?;
        let response = self.expect_success(path, response).await?;
        self.decode(path, response).await
    }

    async fn write(&self, method: Method, path: &str, body: Option<&Value>) -> RtdbResult<()> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(path, builder).await?;
        self.expect_success(path, response).await?;
        Ok(())
    }

    async fn shallow_keys(&self, path: &str) -> RtdbResult<BTreeSet<String>> {
        let builder = self
            .request(Method::GET, path)
            .query(&[("shallow", "true")]);
        let response = self.send(path, builder).await?;
        let response = self.expect_success(path, response).await?;
        Ok(self
            .decode(path, response)
            .await?
            .as_ref()
            .and_then(Value::as_object)
            .map(|children| children.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read_with_etag(&self, path: &str) -> RtdbResult<(Option<Value>, String)> {
        let builder = self
            .request(Method::GET, path)
            .header(ETAG_REQUEST_HEADER, "true");
        let response = self.send(path, builder).await?;
        let response = self.expect_success(path, response).await?;
        let etag = response
            .headers()
            .get(ETAG_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| RtdbDaoError::MissingEtag {
                path: path.to_string(),
            })?;
        let value = self.decode(path, response).await?;
        Ok((value, etag))
    }

    async fn compare_and_set(
        &self,
        path: &str,
        mut updater: Updater,
    ) -> RtdbResult<TransactionOutcome> {
        for attempt in 1..=self.transaction_attempts {
            let (current, etag) = self.read_with_etag(path).await?;
            let Some(next) = updater(current.clone()) else {
                return Ok(TransactionOutcome {
                    committed: false,
                    snapshot: current,
                });
            };

            let builder = if next.is_null() {
                self.request(Method::DELETE, path)
            } else {
                self.request(Method::PUT, path).json(&next)
            }
            .header(IF_MATCH_HEADER, etag);

            let response = self.send(path, builder).await?;
            if response.status() == StatusCode::PRECONDITION_FAILED {
                debug!(path, attempt, "RTDB transaction lost a race; retrying");
                continue;
            }
            self.expect_success(path, response).await?;
            return Ok(TransactionOutcome {
                committed: true,
                snapshot: (!next.is_null()).then_some(next),
            });
        }

        Err(RtdbDaoError::TransactionContention {
            path: path.to_string(),
            attempts: self.transaction_attempts,
        })
    }
}

impl LiveStore for RtdbLiveStore {
    fn get(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move { store.read(&path).await.map_err(Into::into) })
    }

    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let result = if value.is_null() {
                store.write(Method::DELETE, &path, None).await
            } else {
                store.write(Method::PUT, &path, Some(&value)).await
            };
            result.map_err(Into::into)
        })
    }

    fn update(
        &self,
        path: &str,
        patch: Map<String, Value>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let body = Value::Object(patch);
            store
                .write(Method::PATCH, &path, Some(&body))
                .await
                .map_err(Into::into)
        })
    }

    fn delete(&self, path: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            store
                .write(Method::DELETE, &path, None)
                .await
                .map_err(Into::into)
        })
    }

    fn transaction(
        &self,
        path: &str,
        updater: Updater,
    ) -> BoxFuture<'static, StorageResult<TransactionOutcome>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            store
                .compare_and_set(&path, updater)
                .await
                .map_err(Into::into)
        })
    }

    fn subscribe_child_removed(
        &self,
        path: &str,
    ) -> BoxFuture<'static, StorageResult<BoxStream<'static, String>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let initial = store.shallow_keys(&path).await?;
            let poll_interval = store.poll_interval;

            let stream = async_stream::stream! {
                let mut known = initial;
                let mut ticker = interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    match store.shallow_keys(&path).await {
                        Ok(current) => {
                            let removed: Vec<String> =
                                known.difference(&current).cloned().collect();
                            known = current;
                            for key in removed {
                                yield key;
                            }
                        }
                        Err(err) => {
                            warn!(path = %path, error = %err, "RTDB child poll failed");
                        }
                    }
                }
            };

            Ok(stream.boxed())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .shallow_keys("rooms")
                .await
                .map(|_| ())
                .map_err(Into::into)
        })
    }
}
