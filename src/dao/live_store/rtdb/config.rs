use std::time::Duration;

use super::error::{RtdbDaoError, RtdbResult};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 25;

/// Runtime configuration describing how to reach a Firebase Realtime Database over REST.
#[derive(Debug, Clone)]
pub struct RtdbConfig {
    /// Database root URL, e.g. `https://project.firebaseio.com`.
    pub base_url: String,
    /// Database secret or ID token appended as the `auth` query parameter.
    pub auth: Option<String>,
    /// How often watched nodes are polled for removed children.
    pub poll_interval: Duration,
    /// Compare-and-set attempts before a transaction gives up.
    pub transaction_attempts: u32,
}

impl RtdbConfig {
    /// Construct a configuration for the given database URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            transaction_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
        }
    }

    /// Attach an auth token to every request.
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Build a configuration by reading `RTDB_URL`, `RTDB_AUTH` and `RTDB_POLL_MS`.
    pub fn from_env() -> RtdbResult<Self> {
        let base_url = std::env::var("RTDB_URL")
            .map_err(|_| RtdbDaoError::MissingEnvVar { var: "RTDB_URL" })?;

        let mut config = Self::new(base_url);
        if let Ok(auth) = std::env::var("RTDB_AUTH") {
            config = config.with_auth(auth);
        }
        if let Some(poll_ms) = std::env::var("RTDB_POLL_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
        {
            config.poll_interval = Duration::from_millis(poll_ms);
        }

        Ok(config)
    }
}
